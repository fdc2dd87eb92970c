pub mod bundle;
pub mod island;
pub mod serve;
pub mod version;
