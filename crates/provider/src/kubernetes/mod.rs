mod client;

pub use client::KubeResourceManager;
