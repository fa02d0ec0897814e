//! Entity definitions for the peering object graph.

use super::{
    extension, field, DepthLimits, EntitySchema, ExtensionFilter, ExtensionKind, FieldDef,
    FieldKind::*, LinkColumn, LinkPath, NamespaceRule, RelationDef,
};

// ============================================================================
// LINK PATHS
// ============================================================================

const NET_TO_IXLAN: LinkPath = LinkPath::direct("netixlan", "net_id", "ixlan_id");

const NET_TO_IX: LinkPath = LinkPath {
    join: "netixlan",
    self_col: LinkColumn::Direct("net_id"),
    other_col: LinkColumn::Via {
        fk: "ixlan_id",
        tag: "ixlan",
        column: "ix_id",
    },
};

const NET_TO_FAC: LinkPath = LinkPath::direct("netfac", "net_id", "fac_id");
const FAC_TO_NET: LinkPath = LinkPath::direct("netfac", "fac_id", "net_id");
const FAC_TO_IX: LinkPath = LinkPath::direct("ixfac", "fac_id", "ix_id");
const IX_TO_FAC: LinkPath = LinkPath::direct("ixfac", "ix_id", "fac_id");

const IX_TO_NET: LinkPath = LinkPath {
    join: "netixlan",
    self_col: VIA_IXLAN_TO_IX,
    other_col: LinkColumn::Direct("net_id"),
};

const IXLAN_TO_NET: LinkPath = LinkPath::direct("netixlan", "ixlan_id", "net_id");

/// `ix_id` of a row hanging off an exchange LAN.
const VIA_IXLAN_TO_IX: LinkColumn = LinkColumn::Via {
    fk: "ixlan_id",
    tag: "ixlan",
    column: "ix_id",
};

/// Facilities by the organisations owning their networks or exchanges.
const FAC_TO_OWNER: &[LinkPath] = &[
    LinkPath {
        join: "netfac",
        self_col: LinkColumn::Direct("fac_id"),
        other_col: LinkColumn::Via {
            fk: "net_id",
            tag: "net",
            column: "org_id",
        },
    },
    LinkPath {
        join: "ixfac",
        self_col: LinkColumn::Direct("fac_id"),
        other_col: LinkColumn::Via {
            fk: "ix_id",
            tag: "ix",
            column: "org_id",
        },
    },
];

/// Exchanges by the organisations owning their member networks or facilities.
const IX_TO_OWNER: &[LinkPath] = &[
    LinkPath {
        join: "netixlan",
        self_col: VIA_IXLAN_TO_IX,
        other_col: LinkColumn::Via {
            fk: "net_id",
            tag: "net",
            column: "org_id",
        },
    },
    LinkPath {
        join: "ixfac",
        self_col: LinkColumn::Direct("ix_id"),
        other_col: LinkColumn::Via {
            fk: "fac_id",
            tag: "fac",
            column: "org_id",
        },
    },
];

// ============================================================================
// ORGANIZATION
// ============================================================================

const ORG_FIELDS: &[FieldDef] = &[
    field("name", String),
    field("aka", String),
    field("name_long", String),
    field("website", String),
    field("notes", String),
    field("address1", String),
    field("address2", String),
    field("city", String),
    field("state", String),
    field("zipcode", String),
    field("country", String),
    field("latitude", Float),
    field("longitude", Float),
];

const ORG_RELATIONS: &[RelationDef] = &[
    RelationDef::has_many("net_set", "net", "org_id").excluding(&["org_id", "org"]),
    RelationDef::has_many("fac_set", "fac", "org_id").excluding(&["org_id", "org"]),
    RelationDef::has_many("ix_set", "ix", "org_id").excluding(&["org_id", "org"]),
];

const ORG_EXTENSIONS: &[ExtensionFilter] = &[
    extension(
        "asn",
        ExtensionKind::ChildMatches {
            child: "net",
            fk: "org_id",
            field: "asn",
        },
    ),
    extension("name_search", ExtensionKind::NameSearch),
    extension("near", ExtensionKind::GeoDistance),
];

const ORG: EntitySchema = EntitySchema {
    tag: "org",
    fields: ORG_FIELDS,
    relations: ORG_RELATIONS,
    depth: DepthLimits::STANDARD,
    list_exclude: &[],
    unique_keys: &["id"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::root("org"),
    extensions: ORG_EXTENSIONS,
};

// ============================================================================
// NETWORK
// ============================================================================

const NET_FIELDS: &[FieldDef] = &[
    field("name", String),
    field("aka", String),
    field("name_long", String),
    field("website", String),
    field("asn", Integer),
    field("looking_glass", String),
    field("route_server", String),
    field("irr_as_set", String),
    field("info_type", String),
    field("info_prefixes4", Integer),
    field("info_prefixes6", Integer),
    field("info_traffic", String),
    field("info_ratio", String),
    field("info_scope", String),
    field("info_unicast", Boolean),
    field("info_multicast", Boolean),
    field("info_ipv6", Boolean),
    field("info_never_via_route_servers", Boolean),
    field("notes", String),
    field("policy_url", String),
    field("policy_general", String),
    field("policy_locations", String),
    field("policy_ratio", Boolean),
    field("policy_contracts", String),
    field("allow_ixp_update", Boolean),
    field("netixlan_updated", DateTime),
    field("netfac_updated", DateTime),
    field("poc_updated", DateTime),
];

const NET_RELATIONS: &[RelationDef] = &[
    RelationDef::belongs_to("org", "org", "org", "org_id"),
    RelationDef::has_many("netfac_set", "netfac", "net_id").excluding(&["net_id", "net"]),
    RelationDef::has_many("netixlan_set", "netixlan", "net_id").excluding(&["net_id", "net"]),
    RelationDef::has_many("poc_set", "poc", "net_id").excluding(&["net_id", "net"]),
];

const NET_EXTENSIONS: &[ExtensionFilter] = &[
    extension("ix", ExtensionKind::LinkedTo(NET_TO_IX)),
    extension("ixlan", ExtensionKind::LinkedTo(NET_TO_IXLAN)),
    extension("fac", ExtensionKind::LinkedTo(NET_TO_FAC)),
    extension("not_ix", ExtensionKind::NotLinkedTo(NET_TO_IX)),
    extension("not_fac", ExtensionKind::NotLinkedTo(NET_TO_FAC)),
    extension("name_search", ExtensionKind::NameSearch),
];

const NET: EntitySchema = EntitySchema {
    tag: "net",
    fields: NET_FIELDS,
    relations: NET_RELATIONS,
    depth: DepthLimits::STANDARD,
    list_exclude: &["org"],
    unique_keys: &["id", "asn"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::under("network", "org_id", "org"),
    extensions: NET_EXTENSIONS,
};

// ============================================================================
// FACILITY
// ============================================================================

const FAC_FIELDS: &[FieldDef] = &[
    field("name", String),
    field("aka", String),
    field("name_long", String),
    field("website", String),
    field("clli", String),
    field("rencode", String),
    field("npanxx", String),
    field("notes", String),
    field("net_count", Integer),
    field("ix_count", Integer),
    field("address1", String),
    field("address2", String),
    field("city", String),
    field("state", String),
    field("zipcode", String),
    field("country", String),
    field("latitude", Float),
    field("longitude", Float),
];

const FAC_RELATIONS: &[RelationDef] = &[RelationDef::belongs_to("org", "org", "org", "org_id")];

const FAC_EXTENSIONS: &[ExtensionFilter] = &[
    extension("net", ExtensionKind::LinkedTo(FAC_TO_NET)),
    extension("ix", ExtensionKind::LinkedTo(FAC_TO_IX)),
    extension("not_net", ExtensionKind::NotLinkedTo(FAC_TO_NET)),
    extension("all_net", ExtensionKind::LinkedToAll(FAC_TO_NET)),
    extension("asn_overlap", ExtensionKind::AsnOverlap(FAC_TO_NET)),
    extension("org_present", ExtensionKind::LinkedToAny(FAC_TO_OWNER)),
    extension("org_not_present", ExtensionKind::NotLinkedToAny(FAC_TO_OWNER)),
    extension("name_search", ExtensionKind::NameSearch),
    extension("near", ExtensionKind::GeoDistance),
];

const FAC: EntitySchema = EntitySchema {
    tag: "fac",
    fields: FAC_FIELDS,
    relations: FAC_RELATIONS,
    depth: DepthLimits::STANDARD,
    list_exclude: &["org"],
    unique_keys: &["id"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::under("facility", "org_id", "org"),
    extensions: FAC_EXTENSIONS,
};

// ============================================================================
// EXCHANGE
// ============================================================================

const IX_FIELDS: &[FieldDef] = &[
    field("name", String),
    field("aka", String),
    field("name_long", String),
    field("city", String),
    field("country", String),
    field("region_continent", String),
    field("media", String),
    field("notes", String),
    field("proto_unicast", Boolean),
    field("proto_multicast", Boolean),
    field("proto_ipv6", Boolean),
    field("website", String),
    field("url_stats", String),
    field("tech_email", String),
    field("tech_phone", String),
    field("policy_email", String),
    field("policy_phone", String),
    field("net_count", Integer),
    field("fac_count", Integer),
];

const IX_RELATIONS: &[RelationDef] = &[
    RelationDef::belongs_to("org", "org", "org", "org_id"),
    RelationDef::has_many("fac_set", "fac", "ix_id").via("ixfac", "fac_id"),
    RelationDef::has_many("ixlan_set", "ixlan", "ix_id").excluding(&["ix_id", "ix"]),
];

const IX_EXTENSIONS: &[ExtensionFilter] = &[
    extension("fac", ExtensionKind::LinkedTo(IX_TO_FAC)),
    extension("net", ExtensionKind::LinkedTo(IX_TO_NET)),
    extension("not_net", ExtensionKind::NotLinkedTo(IX_TO_NET)),
    extension("all_net", ExtensionKind::LinkedToAll(IX_TO_NET)),
    extension("asn_overlap", ExtensionKind::AsnOverlap(IX_TO_NET)),
    extension("org_present", ExtensionKind::LinkedToAny(IX_TO_OWNER)),
    extension("org_not_present", ExtensionKind::NotLinkedToAny(IX_TO_OWNER)),
    extension(
        "ipblock",
        ExtensionKind::LinkedPrefix {
            join: "ixpfx",
            self_col: VIA_IXLAN_TO_IX,
            field: "prefix",
        },
    ),
    // port capacity in Mbit/s, the sum of member port speeds
    extension(
        "capacity",
        ExtensionKind::LinkedSum {
            join: "netixlan",
            self_col: VIA_IXLAN_TO_IX,
            field: "speed",
        },
    ),
    extension("name_search", ExtensionKind::NameSearch),
];

const IX: EntitySchema = EntitySchema {
    tag: "ix",
    fields: IX_FIELDS,
    relations: IX_RELATIONS,
    depth: DepthLimits::STANDARD,
    list_exclude: &["org"],
    unique_keys: &["id"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::under("internetexchange", "org_id", "org"),
    extensions: IX_EXTENSIONS,
};

// ============================================================================
// LINK AND LEAF TYPES
// ============================================================================

const IXFAC: EntitySchema = EntitySchema {
    tag: "ixfac",
    fields: &[],
    relations: &[
        RelationDef::belongs_to("ix", "ix", "ix", "ix_id"),
        RelationDef::belongs_to("fac", "facility", "fac", "fac_id"),
    ],
    depth: DepthLimits::STANDARD,
    list_exclude: &["ix", "fac"],
    unique_keys: &["id"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::under("ixfac", "ix_id", "ix"),
    extensions: &[],
};

const IXLAN_FIELDS: &[FieldDef] = &[
    field("name", String),
    field("descr", String),
    field("mtu", Integer),
    field("dot1q_support", Boolean),
    field("rs_asn", Integer),
    field("arp_sponge", String),
    field("ixf_ixp_member_list_url", String),
    field("ixf_ixp_member_list_url_visible", String),
    field("ixf_ixp_import_enabled", Boolean),
];

const IXLAN: EntitySchema = EntitySchema {
    tag: "ixlan",
    fields: IXLAN_FIELDS,
    relations: &[
        RelationDef::belongs_to("ix", "ix", "ix", "ix_id"),
        RelationDef::has_many("net_set", "net", "ixlan_id").via("netixlan", "net_id"),
        RelationDef::has_many("ixpfx_set", "ixpfx", "ixlan_id").excluding(&["ixlan_id", "ixlan"]),
    ],
    depth: DepthLimits::STANDARD,
    list_exclude: &["ix"],
    unique_keys: &["id"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::under("ixlan", "ix_id", "ix"),
    extensions: &[extension("net", ExtensionKind::LinkedTo(IXLAN_TO_NET))],
};

const IXPFX: EntitySchema = EntitySchema {
    tag: "ixpfx",
    fields: &[
        field("protocol", String),
        field("prefix", String),
        field("in_dfz", Boolean),
    ],
    relations: &[RelationDef::belongs_to("ixlan", "ixlan", "ixlan", "ixlan_id")],
    depth: DepthLimits::STANDARD,
    list_exclude: &["ixlan"],
    unique_keys: &["id"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::under("prefix", "ixlan_id", "ixlan"),
    extensions: &[],
};

const NETFAC: EntitySchema = EntitySchema {
    tag: "netfac",
    fields: &[field("local_asn", Integer)],
    relations: &[
        RelationDef::belongs_to("net", "network", "net", "net_id"),
        RelationDef::belongs_to("fac", "facility", "fac", "fac_id"),
    ],
    depth: DepthLimits::STANDARD,
    list_exclude: &["net", "fac"],
    unique_keys: &["id"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::under("netfac", "net_id", "net"),
    extensions: &[],
};

const NETIXLAN: EntitySchema = EntitySchema {
    tag: "netixlan",
    fields: &[
        field("name", String),
        field("notes", String),
        field("speed", Integer),
        field("asn", Integer),
        field("ipaddr4", String),
        field("ipaddr6", String),
        field("is_rs_peer", Boolean),
        field("bfd_support", Boolean),
        field("operational", Boolean),
    ],
    relations: &[
        RelationDef::belongs_to("net", "network", "net", "net_id"),
        RelationDef::belongs_to("ixlan", "ixlan", "ixlan", "ixlan_id"),
    ],
    depth: DepthLimits::STANDARD,
    list_exclude: &["net", "ixlan"],
    unique_keys: &["id"],
    blank_when_deleted: &[],
    namespace: NamespaceRule::under("ixlan", "net_id", "net"),
    extensions: &[],
};

const POC: EntitySchema = EntitySchema {
    tag: "poc",
    fields: &[
        field("role", String),
        field("visible", String),
        field("name", String),
        field("phone", String),
        field("email", String),
        field("url", String),
    ],
    relations: &[RelationDef::belongs_to("net", "network", "net", "net_id")],
    depth: DepthLimits::STANDARD,
    list_exclude: &["net"],
    unique_keys: &["id"],
    blank_when_deleted: &["name", "phone", "email", "url"],
    namespace: NamespaceRule::under("poc_set", "net_id", "net").keyed_by("visible"),
    extensions: &[],
};

/// Every peering entity type, in registration order.
pub static PEERING_SCHEMAS: &[EntitySchema] = &[
    ORG, NET, FAC, IX, IXFAC, IXLAN, IXPFX, NETFAC, NETIXLAN, POC,
];
