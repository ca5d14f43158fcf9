// Domain layer: core models, ports (interfaces) and the polars column helpers.

pub mod model;
pub mod ports;
pub mod table;
