pub mod elastic;
#[cfg(test)]
pub(crate) mod memory;

pub use elastic::ElasticStore;
