// Domain layer: market data models, analysis outputs and ports (interfaces).

pub mod model;
pub mod ports;
