use std::{
    fmt,
    fmt::{Debug, Display},
};

/// A wrapper that keeps credentials (gateway secret keys and the like) out of logs and debug output.
/// The inner value is only accessible via an explicit [`Secret::reveal`] call.
#[derive(Clone, Default)]
pub struct Secret<T>
where T: Clone + Default
{
    value: T,
}

impl<T: Clone + Default> Secret<T> {
    pub fn new(value: T) -> Self {
        Self { value }
    }

    pub fn reveal(&self) -> &T {
        &self.value
    }
}

impl<T: Clone + Default> Debug for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

impl<T: Clone + Default> Display for Secret<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("****")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn secrets_are_redacted() {
        let key = Secret::new("sk_live_abcdef".to_string());
        assert_eq!(format!("{key}"), "****");
        assert_eq!(format!("{key:?}"), "****");
        assert_eq!(key.reveal(), "sk_live_abcdef");
    }
}
