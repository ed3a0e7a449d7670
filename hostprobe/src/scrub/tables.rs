//! Vendor and model canonicalization tables.
//!
//! Prefixes are lowercase and matched case-insensitively against normalized
//! text. Order matters: the first matching prefix wins, so longer, more
//! specific prefixes come first. A canonical name either maps to itself or
//! matches no prefix.

/// Vendor prefixes; the whole value is replaced.
pub static VENDORS: &[(&str, &str)] = &[
    ("hewlett packard enterprise", "HPE"),
    ("hewlett-packard enterprise", "HPE"),
    ("hpe", "HPE"),
    ("hewlett-packard", "HP"),
    ("hewlett packard", "HP"),
    ("hp", "HP"),
    ("dell", "Dell"),
    ("lenovo", "Lenovo"),
    ("international business machines", "IBM"),
    ("ibm", "IBM"),
    ("vmware", "VMware"),
    ("microsoft", "Microsoft"),
    ("cisco", "Cisco"),
    ("juniper", "Juniper Networks"),
    ("arista", "Arista Networks"),
    ("super micro", "Supermicro"),
    ("supermicro", "Supermicro"),
    ("intel", "Intel"),
    ("advanced micro devices", "AMD"),
    ("amd", "AMD"),
    ("fujitsu", "Fujitsu"),
    ("innotek", "Oracle"),
    ("oracle", "Oracle"),
    ("sun microsystems", "Oracle"),
    ("qemu", "QEMU"),
    ("red hat", "Red Hat"),
    ("american megatrends", "AMI"),
    ("phoenix", "Phoenix Technologies"),
    ("insyde", "Insyde"),
];

/// Model prefixes; the matched prefix is replaced and the rest kept.
pub static MODELS: &[(&str, &str)] = &[
    ("hpe proliant", "ProLiant"),
    ("hp proliant", "ProLiant"),
    ("dell poweredge", "PowerEdge"),
    ("poweredge", "PowerEdge"),
    ("ibm system x", "System x"),
    ("lenovo thinksystem", "ThinkSystem"),
    ("thinksystem", "ThinkSystem"),
    ("vmware virtual platform", "VMware Virtual Platform"),
    ("virtualbox", "VirtualBox"),
    ("intel xeon", "Intel Xeon"),
    ("intel core", "Intel Core"),
    ("amd epyc", "AMD EPYC"),
    ("amd ryzen", "AMD Ryzen"),
    ("amd opteron", "AMD Opteron"),
];

/// First table entry whose prefix starts `text`, with the matched length
/// in bytes of `text`.
pub fn lookup(table: &[(&str, &'static str)], text: &str) -> Option<(usize, &'static str)> {
    table
        .iter()
        .find(|(prefix, _)| {
            text.get(..prefix.len())
                .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
        })
        .map(|(prefix, canonical)| (prefix.len(), *canonical))
}
