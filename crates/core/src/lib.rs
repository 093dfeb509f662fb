pub mod asr;
pub mod config;
pub mod decode;
pub mod emotion;
pub mod emphasis;
pub mod frames;
pub mod pauses;
pub mod pitch;
pub mod pipeline;
pub mod rate;
pub mod recommend;
pub mod text;
pub mod trim;
pub mod util;
