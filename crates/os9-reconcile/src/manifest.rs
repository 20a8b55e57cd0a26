//! Manifest data model and validation.
//!
//! The manifest is the declarative target state: physical-interface entries
//! keyed by compact label, VLAN entries keyed by VLAN id, port-channel
//! entries keyed by numeric id, and optional system-wide settings. Unknown
//! fields are ignored; invalid field combinations are fatal and raised
//! before any command is emitted.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

use os9_cfgmgr_common::{ReconcileError, ReconcileResult};

/// Compact interface labels are STACK/PORT or STACK/PORT/SUBPORT.
static LABEL_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d+/\d+(/\d+)?$").expect("label regex"));

/// Admin state of an interface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AdminState {
    Up,
    Down,
}

impl AdminState {
    /// The command line asserting this state.
    pub fn command(&self) -> &'static str {
        match self {
            AdminState::Up => "no shutdown",
            AdminState::Down => "shutdown",
        }
    }
}

/// Tagged VLAN declaration: an explicit id list, or the literal `all`
/// meaning every VLAN id declared in the manifest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TaggedVlans {
    List(Vec<u16>),
    Keyword(String),
}

impl TaggedVlans {
    /// True for the `all` keyword form.
    pub fn is_all(&self) -> bool {
        matches!(self, TaggedVlans::Keyword(k) if k == "all")
    }
}

/// Fanout mode: how many sub-interfaces a split port yields.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FanoutMode {
    Single,
    Dual,
    Quad,
}

impl FanoutMode {
    /// Number of child sub-interfaces created by the split.
    pub fn child_count(&self) -> u32 {
        match self {
            FanoutMode::Single => 1,
            FanoutMode::Dual => 2,
            FanoutMode::Quad => 4,
        }
    }

    /// The keyword used in `stack-unit ... portmode <mode>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            FanoutMode::Single => "single",
            FanoutMode::Dual => "dual",
            FanoutMode::Quad => "quad",
        }
    }
}

/// Per-child speed of a fanned-out port. Determines the interface type of
/// the synthesized children.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FanoutSpeed {
    #[serde(rename = "10G")]
    Speed10G,
    #[serde(rename = "25G")]
    Speed25G,
    #[serde(rename = "40G")]
    Speed40G,
    #[serde(rename = "100G")]
    Speed100G,
}

impl FanoutSpeed {
    /// The keyword used in `stack-unit ... speed <speed>`.
    pub fn as_str(&self) -> &'static str {
        match self {
            FanoutSpeed::Speed10G => "10G",
            FanoutSpeed::Speed25G => "25G",
            FanoutSpeed::Speed40G => "40G",
            FanoutSpeed::Speed100G => "100G",
        }
    }

    /// Device interface type reported for children of this speed.
    pub fn interface_type(&self) -> &'static str {
        match self {
            FanoutSpeed::Speed10G => "TengigabitEthernet",
            FanoutSpeed::Speed25G => "TwentyFiveGigE",
            FanoutSpeed::Speed40G => "FortyGigE",
            FanoutSpeed::Speed100G => "HundredGigE",
        }
    }
}

/// Link-aggregation mode of a port-channel.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LagMode {
    #[default]
    Normal,
    Lacp,
}

/// LACP negotiation rate. `slow` asserts `lacp long-timeout` on the
/// port-channel; `fast` is the device default.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LacpRate {
    Fast,
    Slow,
}

/// Declared intent for one interface.
///
/// Exactly one of the L2 field set (`untagged_vlan`, `tagged_vlans`,
/// `stp_edge`) and the L3 field set (`ip4`, `ip6`, `keepalive`) may be
/// populated; violation is a validation error, not a silent merge.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct InterfaceSpec {
    pub description: Option<String>,
    pub admin: Option<AdminState>,
    pub mtu: Option<u32>,
    pub ip4: Option<String>,
    pub ip6: Option<String>,
    pub keepalive: Option<bool>,
    pub untagged_vlan: Option<u16>,
    pub tagged_vlans: Option<TaggedVlans>,
    pub stp_edge: Option<bool>,
    pub fanout: Option<FanoutMode>,
    pub fanout_speed: Option<FanoutSpeed>,
    /// Free-form command lines asserted verbatim inside the block.
    #[serde(default)]
    pub additional: Vec<String>,
}

impl InterfaceSpec {
    /// True if any L2-exclusive field is set.
    pub fn has_l2_fields(&self) -> bool {
        self.untagged_vlan.is_some() || self.tagged_vlans.is_some() || self.stp_edge.is_some()
    }

    /// True if any L3-exclusive field is set.
    pub fn has_l3_fields(&self) -> bool {
        self.ip4.is_some() || self.ip6.is_some() || self.keepalive.is_some()
    }

    /// True if the interface needs hybrid port mode (untagged and tagged
    /// membership on the same port).
    pub fn wants_hybrid(&self) -> bool {
        self.untagged_vlan.is_some() && self.tagged_vlans.is_some()
    }
}

/// Declared intent for one VLAN, including its interface attributes.
///
/// VLAN interfaces are L3-only by device restriction; the flattened
/// interface spec must not carry L2 or fanout fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct VlanSpec {
    pub name: Option<String>,
    #[serde(flatten)]
    pub interface: InterfaceSpec,
}

/// Declared intent for one port-channel.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PortChannelSpec {
    #[serde(default)]
    pub mode: LagMode,
    /// Member interfaces by compact label.
    #[serde(default)]
    pub members: Vec<String>,
    pub lacp_rate: Option<LacpRate>,
    #[serde(flatten)]
    pub interface: InterfaceSpec,
}

/// Spanning-tree protocol selection. At most one protocol may be active.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanningTreeSpec {
    #[serde(default)]
    pub rstp: bool,
    #[serde(default)]
    pub mstp: bool,
    #[serde(default)]
    pub pvst: bool,
}

impl SpanningTreeSpec {
    /// The three protocol keywords in device order.
    pub const PROTOCOLS: [&'static str; 3] = ["rstp", "mstp", "pvst"];

    /// Whether the named protocol is declared active.
    pub fn is_active(&self, protocol: &str) -> bool {
        match protocol {
            "rstp" => self.rstp,
            "mstp" => self.mstp,
            "pvst" => self.pvst,
            _ => false,
        }
    }

    /// Number of protocols declared active.
    pub fn active_count(&self) -> usize {
        [self.rstp, self.mstp, self.pvst]
            .iter()
            .filter(|b| **b)
            .count()
    }
}

/// Multi-chassis link-aggregation (VLT) domain declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct VltSpec {
    pub domain: u32,
    pub priority: Option<u32>,
    pub peer_link_port_channel: Option<u32>,
    pub backup_destination: Option<String>,
    pub unit_id: Option<u8>,
}

/// System-wide, non-interface settings.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SystemSpec {
    pub spanning_tree: Option<SpanningTreeSpec>,
    pub vlt: Option<VltSpec>,
}

/// The complete declarative target state for one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Manifest {
    /// Physical interfaces, keyed by compact label.
    #[serde(default)]
    pub interfaces: BTreeMap<String, InterfaceSpec>,
    /// VLANs, keyed by VLAN id.
    #[serde(default)]
    pub vlans: BTreeMap<u16, VlanSpec>,
    /// Port-channels, keyed by numeric id.
    #[serde(default)]
    pub port_channels: BTreeMap<u32, PortChannelSpec>,
    /// Optional system-wide settings.
    pub system: Option<SystemSpec>,
}

/// Validates the whole manifest. Must pass before any command is emitted.
pub fn validate(manifest: &Manifest) -> ReconcileResult<()> {
    for (label, spec) in &manifest.interfaces {
        validate_label(label)?;
        validate_interface(label, spec)?;
        if spec.fanout.is_some() != spec.fanout_speed.is_some() {
            return Err(ReconcileError::manifest(
                label,
                "fanout and fanout_speed must be declared together",
            ));
        }
        if spec.fanout.is_some() && label.split('/').count() != 2 {
            return Err(ReconcileError::manifest(
                label,
                "fanout applies to a whole port (STACK/PORT), not a sub-port",
            ));
        }
    }

    for (vlan_id, spec) in &manifest.vlans {
        let entity = format!("vlan {}", vlan_id);
        if *vlan_id == 0 || *vlan_id > 4094 {
            return Err(ReconcileError::manifest(&entity, "VLAN id must be 1-4094"));
        }
        if spec.interface.has_l2_fields() {
            return Err(ReconcileError::manifest(
                &entity,
                "VLAN interfaces are L3-only and cannot carry L2 fields",
            ));
        }
        if spec.interface.fanout.is_some() || spec.interface.fanout_speed.is_some() {
            return Err(ReconcileError::manifest(&entity, "VLAN interfaces cannot fan out"));
        }
        validate_interface(&entity, &spec.interface)?;
    }

    for (pc_id, spec) in &manifest.port_channels {
        let entity = format!("port-channel {}", pc_id);
        if *pc_id == 0 {
            return Err(ReconcileError::manifest(&entity, "port-channel id must be positive"));
        }
        if spec.interface.fanout.is_some() || spec.interface.fanout_speed.is_some() {
            return Err(ReconcileError::manifest(&entity, "port-channels cannot fan out"));
        }
        if spec.mode == LagMode::Normal && spec.lacp_rate.is_some() {
            return Err(ReconcileError::manifest(
                &entity,
                "lacp_rate requires mode: lacp",
            ));
        }
        for member in &spec.members {
            if !LABEL_RE.is_match(member) {
                return Err(ReconcileError::manifest(
                    &entity,
                    format!("member '{}' is not a valid STACK/PORT[/SUBPORT] label", member),
                ));
            }
        }
        validate_interface(&entity, &spec.interface)?;
    }

    // Declaring several active spanning-tree protocols is checked by the
    // system stage, which classifies it as a structural inconsistency.
    if let Some(system) = &manifest.system {
        if let Some(vlt) = &system.vlt {
            if vlt.domain == 0 {
                return Err(ReconcileError::manifest("system", "VLT domain id must be positive"));
            }
        }
    }

    Ok(())
}

fn validate_label(label: &str) -> ReconcileResult<()> {
    if !LABEL_RE.is_match(label) {
        return Err(ReconcileError::manifest(
            label,
            "interface label must be in the format STACK/PORT or STACK/PORT/SUBPORT",
        ));
    }
    Ok(())
}

fn validate_interface(entity: &str, spec: &InterfaceSpec) -> ReconcileResult<()> {
    if spec.has_l2_fields() && spec.has_l3_fields() {
        return Err(ReconcileError::manifest(
            entity,
            "cannot operate in both L2 and L3 mode",
        ));
    }
    if let Some(desc) = &spec.description {
        if desc.is_empty() {
            return Err(ReconcileError::manifest(
                entity,
                "description must not be an empty string",
            ));
        }
    }
    if spec.mtu == Some(0) {
        return Err(ReconcileError::manifest(entity, "MTU must be greater than 0"));
    }
    if let Some(vlan) = spec.untagged_vlan {
        if vlan == 0 || vlan > 4094 {
            return Err(ReconcileError::manifest(entity, "untagged VLAN must be 1-4094"));
        }
    }
    if let Some(tagged) = &spec.tagged_vlans {
        match tagged {
            TaggedVlans::List(ids) => {
                for id in ids {
                    if *id == 0 || *id > 4094 {
                        return Err(ReconcileError::manifest(entity, "tagged VLANs must be 1-4094"));
                    }
                }
            }
            TaggedVlans::Keyword(k) if k == "all" => {}
            TaggedVlans::Keyword(k) => {
                return Err(ReconcileError::manifest(
                    entity,
                    format!("tagged_vlans must be a list of ids or 'all', got '{}'", k),
                ));
            }
        }
    }
    Ok(())
}
