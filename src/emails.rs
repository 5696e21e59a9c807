//! Transactional and follow-up email bodies.
//!
//! Templates live in `templates/` and are compiled into the binary. They are
//! named `*.html`, so every interpolated value is HTML-escaped.

use chrono::{DateTime, Duration, Utc};
use minijinja::{Environment, context};
use serde::Serialize;

use crate::access_code::AccessCode;
use crate::error::Result;
use crate::tiers::{self, BundleKey};

const TEMPLATES: [(&str, &str); 9] = [
    ("base.html", include_str!("../templates/base.html")),
    ("capture_immediate.html", include_str!("../templates/capture_immediate.html")),
    ("follow_up_tip.html", include_str!("../templates/follow_up_tip.html")),
    ("follow_up_case_study.html", include_str!("../templates/follow_up_case_study.html")),
    ("follow_up_offer.html", include_str!("../templates/follow_up_offer.html")),
    ("follow_up_final.html", include_str!("../templates/follow_up_final.html")),
    ("purchase_admin.html", include_str!("../templates/purchase_admin.html")),
    ("purchase_customer.html", include_str!("../templates/purchase_customer.html")),
    ("testimonial.html", include_str!("../templates/testimonial.html")),
];

const DISCOUNT_CODE: &str = "FIRSTSCAN";
const DISCOUNT_PERCENT: u32 = 20;
const OFFER_BUNDLES: [BundleKey; 3] = [BundleKey::Weekend, BundleKey::Moving, BundleKey::Estate];

#[derive(Debug, Clone, PartialEq)]
pub struct RenderedEmail {
    pub subject: String,
    pub html: String,
}

fn environment() -> Result<Environment<'static>> {
    let mut env = Environment::new();
    for (name, source) in TEMPLATES {
        env.add_template(name, source)?;
    }
    Ok(env)
}

fn render(name: &str, ctx: minijinja::Value) -> Result<String> {
    let env = environment()?;
    Ok(env.get_template(name)?.render(ctx)?)
}

pub fn format_cents(cents: i64) -> String {
    format!("${:.2}", cents as f64 / 100.0)
}

pub struct PurchaseNotice<'a> {
    pub customer_name: &'a str,
    pub customer_email: &'a str,
    pub first_name: &'a str,
    pub bundle_label: &'a str,
    pub amount_cents: i64,
    pub access_code: &'a AccessCode,
    pub payment_id: &'a str,
    pub purchased_at: DateTime<Utc>,
}

pub fn purchase_admin(notice: &PurchaseNotice<'_>) -> Result<RenderedEmail> {
    let year_extension = if notice.access_code.add_on { "Yes" } else { "No" };
    let rows = vec![
        ("Customer", notice.customer_name.to_string()),
        ("Email", notice.customer_email.to_string()),
        ("Bundle", notice.bundle_label.to_string()),
        ("Amount", format_cents(notice.amount_cents)),
        ("Year Extension", year_extension.to_string()),
        ("Access Code", notice.access_code.code()),
        ("Payment ID", notice.payment_id.to_string()),
        (
            "Time",
            notice.purchased_at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        ),
    ];

    Ok(RenderedEmail {
        subject: format!("💰 New ItemValue Purchase - {}", notice.bundle_label),
        html: render("purchase_admin.html", context! { rows })?,
    })
}

pub fn purchase_customer(notice: &PurchaseNotice<'_>, app_base_url: &str) -> Result<RenderedEmail> {
    let html = render(
        "purchase_customer.html",
        context! {
            first_name => notice.first_name,
            bundle_label => notice.bundle_label,
            access_code => notice.access_code.code(),
            scans => notice.access_code.scans,
            days => notice.access_code.days,
            add_on => notice.access_code.add_on,
            app_base_url,
        },
    )?;

    Ok(RenderedEmail {
        subject: "🎉 Your ItemValue Access Code".to_string(),
        html,
    })
}

pub fn capture_immediate(
    first_name: &str,
    last_item: Option<&str>,
    email: &str,
    app_base_url: &str,
) -> Result<RenderedEmail> {
    let html = render(
        "capture_immediate.html",
        context! { first_name, last_item, email, app_base_url },
    )?;

    Ok(RenderedEmail {
        subject: "Your item values are saved! Here's what we found...".to_string(),
        html,
    })
}

/// The abandoned-scan sequence sent after the immediate capture email.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FollowUp {
    Tip,
    CaseStudy,
    Offer,
    Final,
}

#[derive(Serialize)]
struct OfferRow {
    name: &'static str,
    scans: u32,
    days: u32,
    price: u32,
    discounted: String,
}

impl FollowUp {
    pub const SEQUENCE: [FollowUp; 4] = [
        FollowUp::Tip,
        FollowUp::CaseStudy,
        FollowUp::Offer,
        FollowUp::Final,
    ];

    pub fn delay(self) -> Duration {
        match self {
            FollowUp::Tip => Duration::hours(1),
            FollowUp::CaseStudy => Duration::hours(24),
            FollowUp::Offer => Duration::hours(48),
            FollowUp::Final => Duration::hours(72),
        }
    }

    pub fn subject(self) -> &'static str {
        match self {
            FollowUp::Tip => "Quick tip: The #1 mistake people make when selling items",
            FollowUp::CaseStudy => "She made $2,847 from items she almost donated...",
            FollowUp::Offer => "Your 20% discount expires tomorrow",
            FollowUp::Final => "Last chance: Don't let your items go to waste",
        }
    }

    fn template(self) -> &'static str {
        match self {
            FollowUp::Tip => "follow_up_tip.html",
            FollowUp::CaseStudy => "follow_up_case_study.html",
            FollowUp::Offer => "follow_up_offer.html",
            FollowUp::Final => "follow_up_final.html",
        }
    }

    pub fn render(self, first_name: &str, email: &str, app_base_url: &str) -> Result<RenderedEmail> {
        let offers: Vec<OfferRow> = OFFER_BUNDLES
            .iter()
            .map(|key| {
                let bundle = tiers::bundle(*key);
                let discounted =
                    f64::from(bundle.base_price) * f64::from(100 - DISCOUNT_PERCENT) / 100.0;
                OfferRow {
                    name: bundle.display_name,
                    scans: bundle.scan_allotment,
                    days: bundle.validity_days,
                    price: bundle.base_price,
                    discounted: format!("{discounted:.2}"),
                }
            })
            .collect();

        let html = render(
            self.template(),
            context! {
                first_name,
                email,
                app_base_url,
                offers,
                discount_code => DISCOUNT_CODE,
                discount_percent => DISCOUNT_PERCENT,
            },
        )?;

        Ok(RenderedEmail {
            subject: self.subject().to_string(),
            html,
        })
    }
}

pub struct TestimonialNotice<'a> {
    pub feedback: &'a str,
    pub first_name: Option<&'a str>,
    pub can_feature: bool,
    pub trigger_value: Option<f64>,
    pub scan_count: Option<u64>,
    pub submitted_at: Option<&'a str>,
}

pub fn testimonial(notice: &TestimonialNotice<'_>) -> Result<RenderedEmail> {
    let html = render(
        "testimonial.html",
        context! {
            feedback => notice.feedback,
            first_name => notice.first_name,
            can_feature => notice.can_feature,
            trigger_value => notice.trigger_value,
            scan_count => notice.scan_count,
            submitted_at => notice.submitted_at,
        },
    )?;

    let suffix = if notice.can_feature {
        " (OK to feature!)"
    } else {
        ""
    };

    Ok(RenderedEmail {
        subject: format!("💬 New Testimonial{suffix}"),
        html,
    })
}
