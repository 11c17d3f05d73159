pub const HASH_SIZE: usize = 32;
pub const HASH_HEX_SIZE: usize = HASH_SIZE * 2;
pub const DEFAULT_DIFFICULTY: u32 = 2;
/// Nonces tried between two looks at the cancel flag.
pub const CANCEL_POLL_INTERVAL: u64 = 4096;

/// Transfers the demo binaries seed their pool with.
pub const REFERENCE_TRANSACTIONS: [(&str, &str, f32); 10] = [
    ("Carlos", "Sophia", 1.2),
    ("Liam", "Olivia", 3.7),
    ("Mia", "Ethan", 0.8),
    ("Oliver", "Sophia", 1.0),
    ("Emma", "William", 4.2),
    ("Sophia", "Lucas", 2.0),
    ("James", "Ava", 1.5),
    ("Benjamin", "Isabella", 3.1),
    ("William", "Grace", 1.8),
    ("Harper", "Elijah", 2.3),
];
