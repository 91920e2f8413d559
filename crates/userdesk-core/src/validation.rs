//! Form validation rules.
//!
//! Each form is checked by a plain function over its values that returns a
//! `FieldErrors` map. An empty map means the form may be submitted.

use std::collections::BTreeMap;
use std::path::Path;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::models::{Registration, Role, UserUpdate};

/// Field name -> message, ordered for stable display
pub type FieldErrors = BTreeMap<String, String>;

pub const NAME_MIN_LENGTH: usize = 2;
pub const NAME_MAX_LENGTH: usize = 50;
pub const PASSWORD_MIN_LENGTH: usize = 6;
pub const PASSWORD_MAX_LENGTH: usize = 100;

/// Largest accepted profile image
pub const MAX_IMAGE_BYTES: u64 = 2 * 1024 * 1024;

const ALLOWED_IMAGE_TYPES: [&str; 3] = ["image/jpeg", "image/png", "image/gif"];

static EMAIL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[^\s@]+@[^\s@]+\.[^\s@]+$").expect("email pattern is valid"));

/// Form fields, named as the API names them
pub mod field {
    pub const NAME: &str = "name";
    pub const EMAIL: &str = "email";
    pub const PASSWORD: &str = "password";
    pub const CONFIRM_PASSWORD: &str = "confirmPassword";
    pub const ROLE: &str = "role";
    pub const IMAGE: &str = "image";
}

pub fn is_valid_email(email: &str) -> bool {
    EMAIL_RE.is_match(email)
}

fn email_error(email: &str) -> Option<&'static str> {
    if email.is_empty() {
        Some("Email is required")
    } else if !is_valid_email(email) {
        Some("Please enter a valid email address")
    } else {
        None
    }
}

fn insert(errors: &mut FieldErrors, field: &str, message: Option<&str>) {
    if let Some(message) = message {
        errors.insert(field.to_string(), message.to_string());
    }
}

// ===== Login =====

/// Full check run on submit
pub fn validate_login(email: &str, password: &str) -> FieldErrors {
    let mut errors = FieldErrors::new();
    insert(&mut errors, field::EMAIL, email_error(email));

    let password_error = if password.is_empty() {
        Some("Password is required")
    } else if password.chars().count() < PASSWORD_MIN_LENGTH {
        Some("Password must be at least 6 characters")
    } else {
        None
    };
    insert(&mut errors, field::PASSWORD, password_error);
    errors
}

/// Check run when focus leaves a single login field. An empty password is
/// not reported until submit.
pub fn validate_login_field(name: &str, email: &str, password: &str) -> Option<String> {
    match name {
        field::EMAIL => email_error(email).map(str::to_string),
        field::PASSWORD => {
            let len = password.chars().count();
            (len > 0 && len < PASSWORD_MIN_LENGTH)
                .then(|| "Password must be at least 6 characters".to_string())
        }
        _ => None,
    }
}

// ===== Registration =====

fn name_error(name: &str) -> Option<&'static str> {
    let len = name.trim().chars().count();
    if len == 0 {
        Some("Name is required")
    } else if len < NAME_MIN_LENGTH {
        Some("Name must be at least 2 characters")
    } else if len > NAME_MAX_LENGTH {
        Some("Name must be less than 50 characters")
    } else {
        None
    }
}

fn registration_password_error(password: &str) -> Option<&'static str> {
    let len = password.chars().count();
    if len == 0 {
        return Some("Password is required");
    }
    if len < PASSWORD_MIN_LENGTH {
        return Some("Password must be at least 6 characters");
    }
    if len > PASSWORD_MAX_LENGTH {
        return Some("Password must be less than 100 characters");
    }
    let has_lower = password.chars().any(|c| c.is_ascii_lowercase());
    let has_upper = password.chars().any(|c| c.is_ascii_uppercase());
    let has_digit = password.chars().any(|c| c.is_ascii_digit());
    if !(has_lower && has_upper && has_digit) {
        return Some(
            "Password must contain at least one uppercase letter, one lowercase letter, and one number",
        );
    }
    None
}

/// MIME type guessed from the file extension
pub fn image_mime(path: &Path) -> Option<String> {
    mime_guess::from_path(path)
        .first()
        .map(|mime| mime.essence_str().to_string())
}

fn image_error(image: Option<&Path>) -> Option<&'static str> {
    let Some(path) = image else {
        return Some("Profile image is required");
    };
    let allowed = image_mime(path)
        .map(|mime| ALLOWED_IMAGE_TYPES.contains(&mime.as_str()))
        .unwrap_or(false);
    if !allowed {
        return Some("Only JPEG, PNG, and GIF files are allowed");
    }
    match std::fs::metadata(path) {
        Ok(meta) if meta.len() <= MAX_IMAGE_BYTES => None,
        Ok(_) => Some("File size must be less than 2MB"),
        Err(_) => Some("Profile image could not be read"),
    }
}

pub fn validate_registration(form: &Registration) -> FieldErrors {
    let mut errors = FieldErrors::new();
    insert(&mut errors, field::NAME, name_error(&form.name));
    insert(&mut errors, field::EMAIL, email_error(form.email.trim()));
    insert(&mut errors, field::PASSWORD, registration_password_error(&form.password));

    let confirm_error = if form.confirm_password.is_empty() {
        Some("Please confirm your password")
    } else if form.confirm_password != form.password {
        Some("Passwords must match")
    } else {
        None
    };
    insert(&mut errors, field::CONFIRM_PASSWORD, confirm_error);

    let role_error = if form.role.trim().is_empty() {
        Some("Role is required")
    } else if Role::parse(&form.role).is_none() {
        Some("Please select a valid role")
    } else {
        None
    };
    insert(&mut errors, field::ROLE, role_error);
    insert(&mut errors, field::IMAGE, image_error(form.image.as_deref()));
    errors
}

// ===== Edit =====

pub fn validate_user_update(update: &UserUpdate) -> FieldErrors {
    let mut errors = FieldErrors::new();
    if update.name.trim().is_empty() {
        insert(&mut errors, field::NAME, Some("Name is required"));
    }
    insert(&mut errors, field::EMAIL, email_error(update.email.trim()));
    errors
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn valid_registration(image: &Path) -> Registration {
        Registration {
            name: "Ann Lee".to_string(),
            email: "ann@example.com".to_string(),
            password: "Secret1".to_string(),
            confirm_password: "Secret1".to_string(),
            role: "user".to_string(),
            image: Some(image.to_path_buf()),
        }
    }

    fn temp_image(name: &str, size: usize) -> (tempfile::TempDir, std::path::PathBuf) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(name);
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(&vec![0u8; size]).unwrap();
        (dir, path)
    }

    #[test]
    fn test_email_pattern() {
        assert!(is_valid_email("a@x.com"));
        assert!(is_valid_email("first.last@sub.example.org"));
        assert!(!is_valid_email("a@x"));
        assert!(!is_valid_email("a x@y.com"));
        assert!(!is_valid_email("@x.com"));
        assert!(!is_valid_email(""));
    }

    #[test]
    fn test_validate_login_required() {
        let errors = validate_login("", "");
        assert_eq!(errors.get("email").map(String::as_str), Some("Email is required"));
        assert_eq!(errors.get("password").map(String::as_str), Some("Password is required"));
    }

    #[test]
    fn test_validate_login_ok() {
        assert!(validate_login("a@x.com", "secret").is_empty());
    }

    #[test]
    fn test_validate_login_short_password() {
        let errors = validate_login("a@x.com", "12345");
        assert_eq!(errors.len(), 1);
        assert!(errors.contains_key("password"));
    }

    #[test]
    fn test_validate_login_field_on_leave() {
        assert_eq!(
            validate_login_field("email", "nope", ""),
            Some("Please enter a valid email address".to_string())
        );
        // Empty password is only flagged on submit
        assert_eq!(validate_login_field("password", "", ""), None);
        assert!(validate_login_field("password", "", "abc").is_some());
        assert_eq!(validate_login_field("password", "", "abcdef"), None);
    }

    #[test]
    fn test_validate_registration_ok() {
        let (_dir, image) = temp_image("me.png", 1024);
        assert!(validate_registration(&valid_registration(&image)).is_empty());
    }

    #[test]
    fn test_validate_registration_password_rules() {
        let (_dir, image) = temp_image("me.png", 16);
        let mut form = valid_registration(&image);
        form.password = "alllowercase1".to_string();
        form.confirm_password = form.password.clone();
        let errors = validate_registration(&form);
        assert!(errors["password"].contains("uppercase"));

        form.password = "Secret1".to_string();
        form.confirm_password = "Secret2".to_string();
        let errors = validate_registration(&form);
        assert_eq!(errors["confirmPassword"], "Passwords must match");
    }

    #[test]
    fn test_validate_registration_name_bounds() {
        let (_dir, image) = temp_image("me.png", 16);
        let mut form = valid_registration(&image);
        form.name = " A ".to_string();
        assert_eq!(
            validate_registration(&form)["name"],
            "Name must be at least 2 characters"
        );
        form.name = "x".repeat(51);
        assert!(validate_registration(&form).contains_key("name"));
    }

    #[test]
    fn test_validate_registration_role() {
        let (_dir, image) = temp_image("me.png", 16);
        let mut form = valid_registration(&image);
        form.role = "root".to_string();
        assert_eq!(validate_registration(&form)["role"], "Please select a valid role");
    }

    #[test]
    fn test_validate_registration_image_rules() {
        let mut form = valid_registration(Path::new("unused.png"));
        form.image = None;
        assert_eq!(validate_registration(&form)["image"], "Profile image is required");

        let (_dir, doc) = temp_image("cv.pdf", 16);
        form.image = Some(doc);
        assert!(validate_registration(&form)["image"].contains("JPEG"));

        let (_dir2, big) = temp_image("big.jpg", (MAX_IMAGE_BYTES + 1) as usize);
        form.image = Some(big);
        assert!(validate_registration(&form)["image"].contains("2MB"));
    }

    #[test]
    fn test_validate_user_update() {
        let update = UserUpdate {
            name: " ".to_string(),
            email: "bad".to_string(),
            role: Role::User,
        };
        let errors = validate_user_update(&update);
        assert_eq!(errors.len(), 2);
    }
}
