//! Static plan → seat limit table.
//!
//! The seat limit (`max_employees`) granted to a tenant is a property of the
//! plan slug, not of the plan row, so price changes never silently change
//! entitlements.

/// Seats granted on the free tier, before any paid plan is active.
pub const FREE_TIER_SEATS: i32 = 5;

const PLAN_SEAT_LIMITS: &[(&str, i32)] = &[
    ("free", FREE_TIER_SEATS),
    ("start", 25),
    ("basic", 25),
    ("growth", 100),
    ("pro", 100),
    ("business", 500),
    ("enterprise", 5000),
];

/// Seat limit for a plan slug. `None` for slugs missing from the table.
pub fn seat_limit_for(plan_slug: &str) -> Option<i32> {
    let slug = plan_slug.trim().to_lowercase();
    PLAN_SEAT_LIMITS
        .iter()
        .find(|(s, _)| *s == slug)
        .map(|(_, limit)| *limit)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_slugs_have_limits() {
        assert_eq!(seat_limit_for("basic"), Some(25));
        assert_eq!(seat_limit_for("pro"), Some(100));
        assert_eq!(seat_limit_for("enterprise"), Some(5000));
        assert_eq!(seat_limit_for("free"), Some(FREE_TIER_SEATS));
    }

    #[test]
    fn lookup_normalizes_case_and_whitespace() {
        assert_eq!(seat_limit_for(" PRO "), Some(100));
    }

    #[test]
    fn unknown_slug_has_no_limit() {
        assert_eq!(seat_limit_for("platinum"), None);
        assert_eq!(seat_limit_for(""), None);
    }
}
