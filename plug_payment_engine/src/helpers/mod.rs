mod order_number;
mod otp;

pub use order_number::new_order_number;
pub use otp::{new_otp, OTP_LEN};
