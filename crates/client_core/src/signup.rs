//! Five-step signup flow: name, email, password, phone, secondary email.
//!
//! Each step validates locally before the form moves on. Passing the last
//! step hands the caller a ready [`SignupRequest`] and arms an in-flight
//! guard so the submission can only happen once at a time. The remote
//! outcome is reported back through [`SignupForm::submission_failed`] or
//! [`SignupForm::submission_succeeded`].

use shared::{
    protocol::SignupRequest,
    validate::{email_is_valid, normalize_phone},
};

pub const MIN_PASSWORD_LEN: usize = 6;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default)]
pub enum SignupStep {
    #[default]
    Name,
    Email,
    Password,
    Phone,
    SecondaryEmail,
}

impl SignupStep {
    /// 1-based position for "step N of 5" headers.
    pub fn position(self) -> u8 {
        match self {
            Self::Name => 1,
            Self::Email => 2,
            Self::Password => 3,
            Self::Phone => 4,
            Self::SecondaryEmail => 5,
        }
    }
}

/// What happened when the user pressed "next".
#[derive(Debug, Clone)]
pub enum Advance {
    /// Validation failed; the error text explains why.
    Stayed,
    Moved(SignupStep),
    /// The final step validated; the caller must now send this request and
    /// report the outcome back.
    Submit(SignupRequest),
    /// A submission is already running; the press is dropped.
    Busy,
}

/// What happened when the user pressed "back".
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Retreat {
    /// Backing out of the first step leaves the flow entirely.
    Exit,
    Moved(SignupStep),
    Busy,
}

#[derive(Debug, Clone, Default)]
pub struct SignupForm {
    pub name: String,
    pub email: String,
    pub password: String,
    pub confirm_password: String,
    pub phone: String,
    pub secondary_email: String,
    step: SignupStep,
    error: Option<String>,
    in_flight: bool,
    completed: bool,
    redirect_pending: bool,
}

impl SignupForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn step(&self) -> SignupStep {
        self.step
    }

    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight
    }

    /// Validates the current step and moves forward. On the last step a
    /// successful validation arms the in-flight guard and yields the request
    /// to submit.
    pub fn advance(&mut self) -> Advance {
        if self.in_flight || self.completed {
            return Advance::Busy;
        }
        self.error = None;
        match self.step {
            SignupStep::Name => {
                if self.name.trim().is_empty() {
                    return self.stay("enter your name");
                }
                self.move_to(SignupStep::Email)
            }
            SignupStep::Email => {
                let email = self.email.trim();
                if email.is_empty() {
                    return self.stay("enter your email address");
                }
                if !email_is_valid(email) {
                    return self.stay("enter a valid email address");
                }
                self.move_to(SignupStep::Password)
            }
            SignupStep::Password => {
                if self.password.is_empty() {
                    return self.stay("enter a password");
                }
                if self.password.chars().count() < MIN_PASSWORD_LEN {
                    return self.stay("password must be at least 6 characters");
                }
                if self.password != self.confirm_password {
                    return self.stay("passwords do not match");
                }
                self.move_to(SignupStep::Phone)
            }
            SignupStep::Phone => {
                if self.phone.trim().is_empty() {
                    return self.stay("enter your phone number");
                }
                if normalize_phone(&self.phone).is_none() {
                    return self.stay("enter a valid phone number");
                }
                self.move_to(SignupStep::SecondaryEmail)
            }
            SignupStep::SecondaryEmail => {
                let secondary = self.secondary_email.trim();
                if secondary.is_empty() {
                    return self.stay("enter a secondary email address");
                }
                if !email_is_valid(secondary) {
                    return self.stay("enter a valid secondary email address");
                }
                self.in_flight = true;
                Advance::Submit(self.request())
            }
        }
    }

    /// Moves back one step, or signals the flow should close when already on
    /// the first step.
    pub fn retreat(&mut self) -> Retreat {
        if self.in_flight || self.completed {
            return Retreat::Busy;
        }
        self.error = None;
        let previous = match self.step {
            SignupStep::Name => return Retreat::Exit,
            SignupStep::Email => SignupStep::Name,
            SignupStep::Password => SignupStep::Email,
            SignupStep::Phone => SignupStep::Password,
            SignupStep::SecondaryEmail => SignupStep::Phone,
        };
        self.step = previous;
        Retreat::Moved(previous)
    }

    /// Records a failed submission. The message lands on screen unchanged;
    /// the user decides whether to press "next" again.
    pub fn submission_failed(&mut self, message: impl Into<String>) {
        self.in_flight = false;
        self.error = Some(message.into());
    }

    pub fn submission_succeeded(&mut self) {
        self.in_flight = false;
        self.completed = true;
        self.redirect_pending = true;
    }

    /// True exactly once after a successful submission, so the redirect to
    /// the home screen fires a single time.
    pub fn take_redirect(&mut self) -> bool {
        std::mem::take(&mut self.redirect_pending)
    }

    fn stay(&mut self, message: &str) -> Advance {
        self.error = Some(message.to_string());
        Advance::Stayed
    }

    fn move_to(&mut self, step: SignupStep) -> Advance {
        self.step = step;
        Advance::Moved(step)
    }

    fn request(&self) -> SignupRequest {
        SignupRequest {
            name: self.name.trim().to_string(),
            email: self.email.trim().to_string(),
            password: self.password.clone(),
            phone: normalize_phone(&self.phone).unwrap_or_default(),
            secondary_email: Some(self.secondary_email.trim().to_string()),
        }
    }
}

#[cfg(test)]
#[path = "tests/signup_tests.rs"]
mod tests;
