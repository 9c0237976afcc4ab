// Domain layer: review models and ports. Adapters and agents depend on this, never the reverse.

pub mod model;
pub mod ports;
