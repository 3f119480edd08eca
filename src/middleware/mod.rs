pub mod timing;

pub use timing::RESPONSE_TIME_HEADER;
