pub mod authorization_request;
pub mod object;
pub mod util;
pub mod visual_code;
