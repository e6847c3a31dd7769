pub mod mux;
pub mod resistance_sampler;
pub mod sensor;
