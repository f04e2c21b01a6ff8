use rand::{distributions::Alphanumeric, Rng};

use crate::db_types::OrderNumber;

const ORDER_NUMBER_PREFIX: &str = "PM";
const SUFFIX_LEN: usize = 10;

/// Generates an order number with a random high-entropy suffix. Collisions are possible in theory;
/// the insert path handles them with a bounded regenerate-and-retry.
pub fn new_order_number() -> OrderNumber {
    let suffix: String = rand::thread_rng()
        .sample_iter(&Alphanumeric)
        .take(SUFFIX_LEN)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    OrderNumber(format!("{ORDER_NUMBER_PREFIX}-{suffix}"))
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn order_numbers_have_the_expected_shape() {
        for _ in 0..100 {
            let number = new_order_number();
            let s = number.as_str();
            assert!(s.starts_with("PM-"));
            assert_eq!(s.len(), 3 + SUFFIX_LEN);
            assert!(s[3..].chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn order_numbers_do_not_trivially_collide() {
        let a = new_order_number();
        let b = new_order_number();
        assert_ne!(a, b);
    }
}
