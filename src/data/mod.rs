pub mod augmentation;
pub mod dataloader;
pub mod dataset;
pub mod preprocessing;
pub mod sampler;
