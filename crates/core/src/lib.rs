pub mod analysis;
pub mod clock;
pub mod config;
pub mod generate;
pub mod narration;
pub mod openai;
pub mod playback;
pub mod schedule;
pub mod script;
pub mod session;
pub mod tts;
pub mod util;
