pub mod provider;
pub mod openai;
pub mod claude;
pub mod factory;
