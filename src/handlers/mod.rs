//! One module per deployed function. Each exposes
//! `handle(&Config, FunctionRequest) -> FunctionResponse`.

pub mod analyze;
pub mod capture_email;
pub mod meta_conversion;
pub mod payment_success;
pub mod save_testimonial;
pub mod scan_photo;
pub mod stripe_webhook;
