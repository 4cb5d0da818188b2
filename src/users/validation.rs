use crate::auth::password::COMMON_PASSWORDS;
use crate::users::repo_types::User;
use crate::validator::{matches, not_in, Validator, EMAIL_RX};

pub const PASSWORD_MIN_BYTES: usize = 8;
pub const PASSWORD_MAX_BYTES: usize = 72;
pub const NAME_MAX_BYTES: usize = 500;

pub fn validate_email(v: &mut Validator, email: &str) {
    v.check(!email.is_empty(), "email", "must be provided");
    v.check(matches(email, &EMAIL_RX), "email", "must be a valid email address");
}

pub fn validate_password_plaintext(v: &mut Validator, password: &str) {
    v.check(!password.is_empty(), "password", "must be provided");
    v.check(
        password.len() >= PASSWORD_MIN_BYTES,
        "password",
        "must be at least 8 bytes long",
    );
    v.check(
        password.len() <= PASSWORD_MAX_BYTES,
        "password",
        "must not be more than 72 bytes long",
    );
    v.check(not_in(password, COMMON_PASSWORDS), "password", "is too common");
}

pub fn validate_name(v: &mut Validator, name: &str) {
    v.check(!name.is_empty(), "name", "must be provided");
    v.check(
        name.len() <= NAME_MAX_BYTES,
        "name",
        "must not be more than 500 bytes long",
    );
}

/// Full check before a user is persisted. Password content is only checked
/// when a new plaintext was set on this value.
///
/// Panics if the user has no password hash.
pub fn validate_user(v: &mut Validator, user: &User) {
    validate_name(v, &user.name);
    validate_email(v, &user.email);

    if let Some(plaintext) = user.password.plaintext() {
        validate_password_plaintext(v, plaintext);
    }

    if user.password.hash().is_none() {
        panic!("missing password hash for user");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::password::Password;

    fn user_with_password(password: &str) -> User {
        let mut user = User::new("Alice", "alice@example.com");
        user.password.set(password).unwrap();
        user
    }

    #[test]
    fn valid_user_passes() {
        let mut v = Validator::new();
        validate_user(&mut v, &user_with_password("tr0ub4dor&3"));
        assert!(v.valid(), "{:?}", v.errors());
    }

    #[test]
    fn password_rules() {
        let cases = [
            ("", "must be provided"),
            ("short", "must be at least 8 bytes long"),
            ("password", "is too common"),
        ];
        for (pw, msg) in cases {
            let mut v = Validator::new();
            validate_password_plaintext(&mut v, pw);
            assert_eq!(v.errors()["password"], msg, "for {pw:?}");
        }

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, &"a".repeat(73));
        assert_eq!(v.errors()["password"], "must not be more than 72 bytes long");

        let mut v = Validator::new();
        validate_password_plaintext(&mut v, &"a".repeat(72));
        assert!(v.valid());
    }

    #[test]
    fn name_and_email_rules() {
        let mut user = user_with_password("tr0ub4dor&3");
        user.name = "x".repeat(501);
        user.email = "not-an-email".into();

        let mut v = Validator::new();
        validate_user(&mut v, &user);
        assert_eq!(v.errors()["name"], "must not be more than 500 bytes long");
        assert_eq!(v.errors()["email"], "must be a valid email address");

        let mut v = Validator::new();
        validate_name(&mut v, "");
        validate_email(&mut v, "");
        assert_eq!(v.errors()["name"], "must be provided");
        assert_eq!(v.errors()["email"], "must be provided");
    }

    #[test]
    fn stored_hash_skips_password_rules() {
        let original = user_with_password("tr0ub4dor&3");
        let mut loaded = User::new("Alice", "alice@example.com");
        loaded.password = Password::from_hash(original.password.hash().unwrap().to_vec());

        let mut v = Validator::new();
        validate_user(&mut v, &loaded);
        assert!(v.valid());
    }

    #[test]
    #[should_panic(expected = "missing password hash for user")]
    fn panics_without_hash() {
        let mut v = Validator::new();
        validate_user(&mut v, &User::new("Alice", "alice@example.com"));
    }
}
