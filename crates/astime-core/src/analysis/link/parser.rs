use etherparse::{Ethernet2Slice, SingleVlanSlice};
use pcap_parser::Linktype;

use crate::MacAddr;

use super::error::LinkError;
use super::layout;

/// Ethernet frame with VLAN tags peeled off.
pub struct LinkFrame<'a> {
    pub dst: MacAddr,
    pub src: MacAddr,
    pub vlan_tags: usize,
    /// EtherType of the innermost payload.
    pub ether_type: u16,
    pub payload: &'a [u8],
}

impl LinkFrame<'_> {
    pub fn is_avtp(&self) -> bool {
        self.ether_type == layout::ETHERTYPE_AVTP
    }
}

/// Decode an Ethernet II frame, following up to two VLAN tags.
pub fn parse_link_frame(linktype: Linktype, data: &[u8]) -> Result<LinkFrame<'_>, LinkError> {
    if linktype != Linktype::ETHERNET {
        return Err(LinkError::UnsupportedLinktype(linktype.0));
    }

    let eth = Ethernet2Slice::from_slice_without_fcs(data)
        .map_err(|e| LinkError::Ethernet(e.to_string()))?;
    let mut ether_type = eth.ether_type().0;
    let mut payload = eth.payload_slice();
    let mut vlan_tags = 0;

    while is_vlan_ether_type(ether_type) {
        if vlan_tags == layout::MAX_VLAN_TAGS {
            return Err(LinkError::TooManyTags {
                max: layout::MAX_VLAN_TAGS,
            });
        }
        let vlan =
            SingleVlanSlice::from_slice(payload).map_err(|e| LinkError::Vlan(e.to_string()))?;
        ether_type = vlan.ether_type().0;
        payload = vlan.payload_slice();
        vlan_tags += 1;
    }

    Ok(LinkFrame {
        dst: MacAddr(eth.destination()),
        src: MacAddr(eth.source()),
        vlan_tags,
        ether_type,
        payload,
    })
}

fn is_vlan_ether_type(ether_type: u16) -> bool {
    matches!(
        ether_type,
        layout::ETHERTYPE_VLAN
            | layout::ETHERTYPE_PROVIDER_BRIDGING
            | layout::ETHERTYPE_VLAN_DOUBLE_TAGGED
    )
}
