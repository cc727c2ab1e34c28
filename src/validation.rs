use crate::error::ValidationErrors;
use crate::models::{NewStudent, Student};

pub fn validate_new(student: &NewStudent) -> Result<(), ValidationErrors> {
    check(
        &student.name,
        &student.email,
        &student.phone,
        &student.handle,
        student.current_rating,
        student.max_rating,
    )
}

pub fn validate_student(student: &Student) -> Result<(), ValidationErrors> {
    check(
        &student.name,
        &student.email,
        &student.phone,
        &student.handle,
        student.current_rating,
        student.max_rating,
    )
}

fn check(
    name: &str,
    email: &str,
    phone: &str,
    handle: &str,
    current_rating: i32,
    max_rating: i32,
) -> Result<(), ValidationErrors> {
    let mut errors = ValidationErrors::default();

    if name.trim().is_empty() {
        errors.push("name", "Name is required");
    }

    if email.trim().is_empty() {
        errors.push("email", "Email is required");
    } else if !looks_like_email(email) {
        errors.push("email", "Email is invalid");
    }

    if phone.trim().is_empty() {
        errors.push("phone", "Phone is required");
    }

    if handle.trim().is_empty() {
        errors.push("handle", "Handle is required");
    }

    if current_rating < 0 {
        errors.push("current_rating", "Rating must be positive");
    }

    if max_rating < current_rating {
        errors.push("max_rating", "Max rating must be >= current rating");
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

/// Accepts `local@domain.tld`: non-blank runs around the `@` and a dot
/// inside the domain with text on both sides.
fn looks_like_email(email: &str) -> bool {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return false;
    }
    let Some((local, domain)) = email.rsplit_once('@') else {
        return false;
    };
    if local.is_empty() {
        return false;
    }
    match domain.rfind('.') {
        Some(dot) => dot > 0 && dot + 1 < domain.len(),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn sample() -> NewStudent {
        NewStudent {
            name: "Priya Nair".to_string(),
            email: "priya@example.com".to_string(),
            phone: "+1234567899".to_string(),
            handle: "priya_n".to_string(),
            current_rating: 1400,
            max_rating: 1500,
            last_sync_at: Utc::now(),
            is_active: true,
            inactivity_days: 0,
            reminders_sent: 0,
            auto_email_disabled: false,
        }
    }

    #[test]
    fn accepts_complete_record() {
        assert!(validate_new(&sample()).is_ok());
    }

    #[test]
    fn reports_every_failing_field() {
        let mut student = sample();
        student.name = "  ".to_string();
        student.handle = String::new();
        student.max_rating = 1300;

        let errors = validate_new(&student).unwrap_err();
        assert!(errors.has("name"));
        assert!(errors.has("handle"));
        assert!(errors.has("max_rating"));
        assert!(!errors.has("email"));
        assert_eq!(errors.0.len(), 3);
    }

    #[test]
    fn rejects_negative_rating() {
        let mut student = sample();
        student.current_rating = -5;
        let errors = validate_new(&student).unwrap_err();
        assert!(errors.has("current_rating"));
    }

    #[test]
    fn email_shape() {
        assert!(looks_like_email("a@b.co"));
        assert!(looks_like_email("first.last@mail.example.org"));
        assert!(!looks_like_email("missing-at.example.com"));
        assert!(!looks_like_email("@example.com"));
        assert!(!looks_like_email("user@localhost"));
        assert!(!looks_like_email("user@example."));
        assert!(!looks_like_email("user name@example.com"));
    }
}
