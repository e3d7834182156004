//! Default authority routing: a fixed (category, location type) lookup.
//! Purely deterministic, no external calls; admins reassign afterwards.

use reportline_common::LocationType;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RoutingDecision {
    pub authority_slug: &'static str,
    pub authority_name: &'static str,
    pub reason: &'static str,
}

/// Routing rules in match order. Location-specific rules first, then
/// category-wide rules, then the catch-all.
struct Rule {
    category: Option<&'static str>,
    location_type: Option<LocationType>,
    decision: RoutingDecision,
}

const fn rule(
    category: Option<&'static str>,
    location_type: Option<LocationType>,
    authority_slug: &'static str,
    authority_name: &'static str,
    reason: &'static str,
) -> Rule {
    Rule {
        category,
        location_type,
        decision: RoutingDecision {
            authority_slug,
            authority_name,
            reason,
        },
    }
}

const RULES: &[Rule] = &[
    rule(
        Some("water"),
        Some(LocationType::Hostel),
        "hostel-welfare",
        "Hostel Welfare Office",
        "hostel utility issues go to hostel welfare",
    ),
    rule(
        Some("electricity"),
        Some(LocationType::Hostel),
        "hostel-welfare",
        "Hostel Welfare Office",
        "hostel utility issues go to hostel welfare",
    ),
    rule(
        Some("sanitation"),
        Some(LocationType::Hostel),
        "hostel-welfare",
        "Hostel Welfare Office",
        "hostel sanitation goes to hostel welfare",
    ),
    rule(
        Some("infrastructure"),
        Some(LocationType::Hostel),
        "hostel-welfare",
        "Hostel Welfare Office",
        "hostel infrastructure goes to hostel welfare",
    ),
    rule(
        Some("safety"),
        None,
        "campus-security",
        "Campus Security",
        "safety issues go to security",
    ),
    rule(
        Some("medical"),
        None,
        "health-centre",
        "Health Centre",
        "medical issues go to the health centre",
    ),
    rule(
        Some("wifi"),
        None,
        "network-operations",
        "Network Operations Centre",
        "connectivity issues go to network operations",
    ),
    rule(
        Some("academic"),
        None,
        "academic-affairs",
        "Academic Affairs",
        "academic issues go to academic affairs",
    ),
    rule(
        Some("mess"),
        None,
        "mess-committee",
        "Mess Committee",
        "food issues go to the mess committee",
    ),
    rule(
        Some("water"),
        None,
        "estate-maintenance",
        "Estate & Maintenance",
        "campus utility issues go to estate maintenance",
    ),
    rule(
        Some("electricity"),
        None,
        "estate-maintenance",
        "Estate & Maintenance",
        "campus utility issues go to estate maintenance",
    ),
    rule(
        Some("sanitation"),
        None,
        "estate-maintenance",
        "Estate & Maintenance",
        "campus sanitation goes to estate maintenance",
    ),
    rule(
        Some("infrastructure"),
        None,
        "estate-maintenance",
        "Estate & Maintenance",
        "campus infrastructure goes to estate maintenance",
    ),
];

const DEFAULT_DECISION: RoutingDecision = RoutingDecision {
    authority_slug: "campus-operations",
    authority_name: "Campus Operations",
    reason: "no routing rule matched; default authority",
};

/// Resolve the default handling authority for a canonical issue.
pub fn resolve_authority(category: &str, location_type: LocationType) -> RoutingDecision {
    for rule in RULES {
        let category_ok = rule.category.is_none_or(|c| c == category);
        let location_ok = rule.location_type.is_none_or(|lt| lt == location_type);
        if category_ok && location_ok {
            return rule.decision.clone();
        }
    }
    DEFAULT_DECISION
}
