//! MESHGATE Test Utilities
//!
//! Shared test infrastructure for the MESHGATE workspace:
//! - A small, fully linked peering dataset
//! - A seeded in-memory store
//! - Proptest generators for requests, namespaces and grants

// Re-export the store so tests only need this crate
pub use meshgate_storage::InMemoryStore;

// Re-export core types for convenience
pub use meshgate_core::{
    EntityId, EntityRecord, EntityStatus, Namespace, NamespacePattern, Permissions, QueryRequest,
    RootKind, Timestamp, PEERING_REGISTRY,
};

// ============================================================================
// TEST FIXTURES
// ============================================================================

pub mod fixtures {
    //! A peering dataset with one of everything.
    //!
    //! Org 1 owns three active networks (10, 11, 12, created in that order),
    //! one deleted network (13) and facility 30. Org 2 owns network 20,
    //! facility 31 and exchange 40. Network 10 has a public, a private and a
    //! users-only contact.

    use super::*;
    use chrono::{TimeZone, Utc};

    pub const ORG_ACME: EntityId = 1;
    pub const ORG_OTHER: EntityId = 2;
    pub const NET_TRANSIT: EntityId = 10;
    pub const NET_CDN: EntityId = 11;
    pub const NET_EYEBALL: EntityId = 12;
    pub const NET_DELETED: EntityId = 13;
    pub const NET_OTHER: EntityId = 20;
    pub const FAC_BERLIN: EntityId = 30;
    pub const FAC_FRANKFURT: EntityId = 31;
    pub const IX_BIG: EntityId = 40;
    pub const IXLAN_BIG: EntityId = 50;
    pub const POC_PUBLIC: EntityId = 80;
    pub const POC_PRIVATE: EntityId = 81;
    pub const POC_USERS: EntityId = 82;

    pub const MEMBER_LIST_URL: &str = "https://ix.example.net/members.json";

    /// Midday on the given day of December 2023 (`day` <= 31) or, above
    /// 31, on day `day - 31` of January 2024.
    pub fn day(day: u32) -> Timestamp {
        if day <= 31 {
            Utc.with_ymd_and_hms(2023, 12, day, 12, 0, 0).unwrap()
        } else {
            Utc.with_ymd_and_hms(2024, 1, day - 31, 12, 0, 0).unwrap()
        }
    }

    pub fn orgs() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(ORG_ACME, day(1))
                .with("name", "Acme Holdings")
                .with("country", "DE")
                .with("city", "Berlin")
                .with("latitude", 52.52)
                .with("longitude", 13.40),
            EntityRecord::new(ORG_OTHER, day(2))
                .with("name", "Other Carrier")
                .with("country", "US"),
        ]
    }

    pub fn nets() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(NET_TRANSIT, day(30))
                .with("org_id", ORG_ACME)
                .with("name", "Acme Transit")
                .with("asn", 65010)
                .with("info_ipv6", true)
                .with("info_type", "NSP"),
            // 2024-01-01 12:00, not after the end of that day
            EntityRecord::new(NET_CDN, day(32))
                .with("org_id", ORG_ACME)
                .with("name", "Acme CDN")
                .with("aka", "Acme Content")
                .with("asn", 65011)
                .with("info_ipv6", false)
                .with("info_type", "Content"),
            EntityRecord::new(NET_EYEBALL, Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap())
                .with("org_id", ORG_ACME)
                .with("name", "Acme Broadband")
                .with("asn", 65012)
                .with("info_type", "Cable/DSL/ISP"),
            EntityRecord::new(NET_DELETED, day(33))
                .with("org_id", ORG_ACME)
                .with("name", "Acme Legacy")
                .with("asn", 65013)
                .with_status(EntityStatus::Deleted)
                .with_updated(day(34)),
            EntityRecord::new(NET_OTHER, day(3))
                .with("org_id", ORG_OTHER)
                .with("name", "Other Backbone")
                .with("asn", 65020),
        ]
    }

    pub fn facs() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(FAC_BERLIN, day(4))
                .with("org_id", ORG_ACME)
                .with("name", "Acme DC Berlin")
                .with("city", "Berlin")
                .with("country", "DE")
                .with("latitude", 52.52)
                .with("longitude", 13.40),
            EntityRecord::new(FAC_FRANKFURT, day(5))
                .with("org_id", ORG_OTHER)
                .with("name", "Frankfurt Carrier Hotel")
                .with("city", "Frankfurt")
                .with("country", "DE")
                .with("latitude", 50.11)
                .with("longitude", 8.68),
        ]
    }

    pub fn exchanges() -> Vec<EntityRecord> {
        vec![EntityRecord::new(IX_BIG, day(6))
            .with("org_id", ORG_OTHER)
            .with("name", "Big IX")
            .with("city", "Frankfurt")
            .with("country", "DE")]
    }

    pub fn ixfacs() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(45, day(7)).with("ix_id", IX_BIG).with("fac_id", FAC_BERLIN),
            EntityRecord::new(46, day(7)).with("ix_id", IX_BIG).with("fac_id", FAC_FRANKFURT),
        ]
    }

    pub fn ixlans() -> Vec<EntityRecord> {
        vec![EntityRecord::new(IXLAN_BIG, day(8))
            .with("ix_id", IX_BIG)
            .with("name", "")
            .with("mtu", 1500)
            .with("ixf_ixp_member_list_url", MEMBER_LIST_URL)
            .with("ixf_ixp_member_list_url_visible", "Users")]
    }

    pub fn ixpfxs() -> Vec<EntityRecord> {
        vec![EntityRecord::new(55, day(8))
            .with("ixlan_id", IXLAN_BIG)
            .with("protocol", "IPv4")
            .with("prefix", "198.51.100.0/24")]
    }

    pub fn netfacs() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(60, day(9)).with("net_id", NET_TRANSIT).with("fac_id", FAC_BERLIN),
            EntityRecord::new(61, day(9)).with("net_id", NET_TRANSIT).with("fac_id", FAC_FRANKFURT),
            EntityRecord::new(62, day(9)).with("net_id", NET_CDN).with("fac_id", FAC_BERLIN),
            EntityRecord::new(63, day(9)).with("net_id", NET_OTHER).with("fac_id", FAC_FRANKFURT),
        ]
    }

    pub fn netixlans() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(70, day(10))
                .with("net_id", NET_TRANSIT)
                .with("ixlan_id", IXLAN_BIG)
                .with("asn", 65010)
                .with("speed", 10000)
                .with("ipaddr4", "198.51.100.10")
                .with("operational", true),
            EntityRecord::new(71, day(10))
                .with("net_id", NET_OTHER)
                .with("ixlan_id", IXLAN_BIG)
                .with("asn", 65020)
                .with("speed", 100000)
                .with("ipaddr4", "198.51.100.20")
                .with("operational", true),
        ]
    }

    pub fn pocs() -> Vec<EntityRecord> {
        vec![
            EntityRecord::new(POC_PUBLIC, day(11))
                .with("net_id", NET_TRANSIT)
                .with("role", "NOC")
                .with("visible", "Public")
                .with("name", "Acme NOC")
                .with("email", "noc@acme.example"),
            EntityRecord::new(POC_PRIVATE, day(11))
                .with("net_id", NET_TRANSIT)
                .with("role", "Policy")
                .with("visible", "Private")
                .with("name", "Peering Manager")
                .with("email", "peering@acme.example"),
            EntityRecord::new(POC_USERS, day(11))
                .with("net_id", NET_TRANSIT)
                .with("role", "Technical")
                .with("visible", "Users")
                .with("name", "Ops Desk")
                .with("phone", "+49 30 1234567"),
        ]
    }

    /// Every fixture table as `(tag, rows)`.
    pub fn peering_tables() -> Vec<(&'static str, Vec<EntityRecord>)> {
        vec![
            ("org", orgs()),
            ("net", nets()),
            ("fac", facs()),
            ("ix", exchanges()),
            ("ixfac", ixfacs()),
            ("ixlan", ixlans()),
            ("ixpfx", ixpfxs()),
            ("netfac", netfacs()),
            ("netixlan", netixlans()),
            ("poc", pocs()),
        ]
    }

    /// In-memory store seeded with [`peering_tables`].
    pub async fn peering_store() -> InMemoryStore {
        let store = InMemoryStore::new();
        for (tag, rows) in peering_tables() {
            store.insert_all(tag, rows).await;
        }
        store
    }
}

// ============================================================================
// PROPTEST GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for MESHGATE types.

    use super::*;
    use proptest::prelude::*;

    /// Generate any registered entity type tag.
    pub fn arb_entity_type() -> impl Strategy<Value = &'static str> {
        proptest::sample::select(PEERING_REGISTRY.tags().collect::<Vec<_>>())
    }

    pub fn arb_root_kind() -> impl Strategy<Value = RootKind> {
        prop_oneof![Just(RootKind::List), Just(RootKind::Single)]
    }

    /// Requested depths, including values above every maximum.
    pub fn arb_depth() -> impl Strategy<Value = Option<u32>> {
        prop_oneof![Just(None), (0u32..8).prop_map(Some)]
    }

    pub fn arb_permissions() -> impl Strategy<Value = Permissions> {
        (0u8..16).prop_map(Permissions::from_bits_truncate)
    }

    /// Namespace patterns over the fixture's org tree, wildcards included.
    pub fn arb_namespace_pattern() -> impl Strategy<Value = NamespacePattern> {
        let org = prop_oneof![Just("1".to_string()), Just("2".to_string()), Just("*".to_string())];
        let net = prop_oneof![
            Just("10".to_string()),
            Just("11".to_string()),
            Just("*".to_string())
        ];
        let leaf = prop_oneof![
            Just(String::new()),
            Just(".poc_set.private".to_string()),
            Just(".poc_set.public".to_string()),
            Just(".poc_set.users".to_string()),
        ];
        prop_oneof![
            org.clone().prop_map(|o| NamespacePattern::parse(&format!("org.{}", o))),
            (org, net, leaf).prop_map(|(o, n, l)| {
                NamespacePattern::parse(&format!("org.{}.network.{}{}", o, n, l))
            }),
        ]
    }

    /// Up to five arbitrary grants.
    pub fn arb_grants() -> impl Strategy<Value = Vec<(NamespacePattern, Permissions)>> {
        proptest::collection::vec((arb_namespace_pattern(), arb_permissions()), 0..5)
    }

    /// A listing request with pagination but no filters.
    pub fn arb_plain_listing() -> impl Strategy<Value = QueryRequest> {
        (arb_entity_type(), arb_depth(), 0usize..5, proptest::option::of(1usize..10)).prop_map(
            |(tag, depth, skip, limit)| {
                let mut request = QueryRequest::listing(tag).with_skip(skip);
                request.depth = depth;
                request.limit = limit;
                request
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::fixtures::*;

    #[test]
    fn test_fixture_rows_have_unique_ids() {
        for (tag, rows) in peering_tables() {
            let mut ids: Vec<_> = rows.iter().map(|r| r.id).collect();
            ids.sort_unstable();
            ids.dedup();
            assert_eq!(ids.len(), rows.len(), "duplicate id in {}", tag);
        }
    }

    #[test]
    fn test_day_helper_crosses_year() {
        assert_eq!(day(31).to_rfc3339(), "2023-12-31T12:00:00+00:00");
        assert_eq!(day(32).to_rfc3339(), "2024-01-01T12:00:00+00:00");
    }
}
