use rand::Rng;

pub const OTP_LEN: usize = 6;

/// A 6-digit payout verification code. Leading zeros are allowed.
pub fn new_otp() -> String {
    let mut rng = rand::thread_rng();
    (0..OTP_LEN).map(|_| char::from(b'0' + rng.gen_range(0..10u8))).collect()
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn otps_are_six_digits() {
        for _ in 0..100 {
            let otp = new_otp();
            assert_eq!(otp.len(), OTP_LEN);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }
}
