pub const ETHERTYPE_AVTP: u16 = 0x22f0;

pub const ETHERTYPE_VLAN: u16 = 0x8100;
pub const ETHERTYPE_PROVIDER_BRIDGING: u16 = 0x88a8;
pub const ETHERTYPE_VLAN_DOUBLE_TAGGED: u16 = 0x9100;

/// Stacked 802.1Q/802.1ad tags followed before giving up.
pub const MAX_VLAN_TAGS: usize = 2;
