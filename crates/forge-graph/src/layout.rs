//! Subnet layout: carves the VPC block into one subnet per tier × zone
//! and assigns each subnet its route target.

use std::net::Ipv4Addr;

use serde::{Deserialize, Serialize};

use forge_core::{NetworkTopology, TierKind, parse_cidr};

use crate::error::{GraphError, GraphResult};

/// Where a subnet's non-local traffic goes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case", tag = "type")]
pub enum RouteTarget {
    /// Default route to the VPC's internet gateway.
    InternetGateway,
    /// Default route to the NAT gateway of one zone.
    NatGateway { zone: u8 },
    /// VPC-local route only.
    Local,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Subnet {
    /// `{tier}-{zone letter}`, e.g. `private-b`.
    pub name: String,
    pub tier: String,
    pub kind: TierKind,
    pub zone: u8,
    pub availability_zone: String,
    pub cidr: String,
    pub route: RouteTarget,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubnetLayout {
    vpc_cidr: String,
    zones: u8,
    subnets: Vec<Subnet>,
    /// Tier hosting the NAT gateways, the first public tier declared.
    nat_tier: Option<String>,
}

pub fn zone_letter(zone: u8) -> char {
    (b'a' + zone) as char
}

impl SubnetLayout {
    /// Allocate subnets in tier declaration order, zone-major within a
    /// tier. Each block is aligned to its own size.
    pub fn plan(network: &NetworkTopology, region: &str) -> GraphResult<Self> {
        let (base, prefix) = parse_cidr(&network.cidr)?;
        let base = u64::from(u32::from(base));
        let end = base + (1u64 << (32 - prefix));

        let nat_tier = network
            .tiers
            .iter()
            .find(|t| t.kind == TierKind::Public)
            .map(|t| t.name.clone());

        let mut cursor = base;
        let mut subnets = Vec::with_capacity(network.tiers.len() * network.zones as usize);
        for tier in &network.tiers {
            if tier.mask <= prefix || tier.mask > 28 {
                return Err(GraphError::Layout(format!(
                    "tier {} mask /{} does not fit inside /{prefix}",
                    tier.name, tier.mask
                )));
            }
            if tier.kind == TierKind::Private && nat_tier.is_none() {
                return Err(GraphError::Layout(format!(
                    "private tier {} needs a public tier to host its NAT gateways",
                    tier.name
                )));
            }
            let size = 1u64 << (32 - tier.mask);
            for zone in 0..network.zones {
                cursor = cursor.div_ceil(size) * size;
                if cursor + size > end {
                    return Err(GraphError::Layout(format!(
                        "{} exhausted allocating {}-{}",
                        network.cidr,
                        tier.name,
                        zone_letter(zone)
                    )));
                }
                let addr = Ipv4Addr::from(cursor as u32);
                let route = match tier.kind {
                    TierKind::Public => RouteTarget::InternetGateway,
                    TierKind::Private => RouteTarget::NatGateway { zone },
                    TierKind::Isolated => RouteTarget::Local,
                };
                subnets.push(Subnet {
                    name: format!("{}-{}", tier.name, zone_letter(zone)),
                    tier: tier.name.clone(),
                    kind: tier.kind,
                    zone,
                    availability_zone: format!("{region}{}", zone_letter(zone)),
                    cidr: format!("{addr}/{}", tier.mask),
                    route,
                });
                cursor += size;
            }
        }

        Ok(Self {
            vpc_cidr: network.cidr.clone(),
            zones: network.zones,
            subnets,
            nat_tier,
        })
    }

    pub fn vpc_cidr(&self) -> &str {
        &self.vpc_cidr
    }

    pub fn zones(&self) -> u8 {
        self.zones
    }

    pub fn subnets(&self) -> &[Subnet] {
        &self.subnets
    }

    pub fn in_tier<'a>(&'a self, tier: &'a str) -> impl Iterator<Item = &'a Subnet> + 'a {
        self.subnets.iter().filter(move |s| s.tier == tier)
    }

    pub fn tier_kind(&self, tier: &str) -> Option<TierKind> {
        self.in_tier(tier).next().map(|s| s.kind)
    }

    /// Whether any subnet routes to the internet gateway.
    pub fn needs_internet_gateway(&self) -> bool {
        self.subnets
            .iter()
            .any(|s| s.route == RouteTarget::InternetGateway)
    }

    /// Zones whose private subnets need a NAT gateway.
    pub fn nat_zones(&self) -> Vec<u8> {
        let mut zones: Vec<u8> = self
            .subnets
            .iter()
            .filter_map(|s| match s.route {
                RouteTarget::NatGateway { zone } => Some(zone),
                _ => None,
            })
            .collect();
        zones.sort_unstable();
        zones.dedup();
        zones
    }

    /// Subnet the NAT gateway of `zone` is placed in.
    pub fn nat_host(&self, zone: u8) -> Option<&Subnet> {
        let tier = self.nat_tier.as_deref()?;
        self.in_tier(tier).find(|s| s.zone == zone)
    }

    /// Whether subnets in `from` forward their non-local traffic through
    /// a gateway placed in `to`. A tier always reaches itself.
    ///
    /// Traffic between tiers inside the VPC is governed by boundaries, so
    /// this answers the egress question only: private tiers route to the
    /// public tier hosting their NAT, isolated tiers route nowhere.
    pub fn has_route(&self, from: &str, to: &str) -> bool {
        if from == to {
            return self.in_tier(from).next().is_some();
        }
        self.in_tier(from).any(|s| match s.route {
            RouteTarget::NatGateway { zone } => self.nat_host(zone).is_some_and(|h| h.tier == to),
            RouteTarget::InternetGateway | RouteTarget::Local => false,
        })
    }

    /// Whether subnets in `tier` can reach the internet at all.
    pub fn reaches_internet(&self, tier: &str) -> bool {
        self.in_tier(tier).any(|s| s.route != RouteTarget::Local)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_core::TierSpec;

    fn network(zones: u8, tiers: &[(&str, TierKind, u8)]) -> NetworkTopology {
        NetworkTopology {
            cidr: "10.0.0.0/16".to_string(),
            zones,
            tiers: tiers
                .iter()
                .map(|(name, kind, mask)| TierSpec {
                    name: name.to_string(),
                    kind: *kind,
                    mask: *mask,
                })
                .collect(),
        }
    }

    fn three_tiers() -> NetworkTopology {
        network(
            2,
            &[
                ("public", TierKind::Public, 24),
                ("private", TierKind::Private, 24),
                ("isolated", TierKind::Isolated, 24),
            ],
        )
    }

    #[test]
    fn two_zones_three_tiers_gives_six_subnets() {
        let layout = SubnetLayout::plan(&three_tiers(), "us-east-1").unwrap();
        let cidrs: Vec<(&str, &str)> = layout
            .subnets()
            .iter()
            .map(|s| (s.name.as_str(), s.cidr.as_str()))
            .collect();
        assert_eq!(
            cidrs,
            [
                ("public-a", "10.0.0.0/24"),
                ("public-b", "10.0.1.0/24"),
                ("private-a", "10.0.2.0/24"),
                ("private-b", "10.0.3.0/24"),
                ("isolated-a", "10.0.4.0/24"),
                ("isolated-b", "10.0.5.0/24"),
            ]
        );
        assert_eq!(layout.subnets()[3].availability_zone, "us-east-1b");
    }

    #[test]
    fn route_targets_follow_tier_kind() {
        let layout = SubnetLayout::plan(&three_tiers(), "us-east-1").unwrap();
        let route = |name: &str| {
            layout
                .subnets()
                .iter()
                .find(|s| s.name == name)
                .unwrap()
                .route
        };
        assert_eq!(route("public-b"), RouteTarget::InternetGateway);
        assert_eq!(route("private-b"), RouteTarget::NatGateway { zone: 1 });
        assert_eq!(route("isolated-a"), RouteTarget::Local);
        assert_eq!(layout.nat_zones(), vec![0, 1]);
        assert_eq!(layout.nat_host(1).unwrap().name, "public-b");
    }

    #[test]
    fn isolated_has_no_route_to_public() {
        let layout = SubnetLayout::plan(&three_tiers(), "us-east-1").unwrap();
        assert!(!layout.has_route("isolated", "public"));
        assert!(!layout.has_route("isolated", "private"));
        assert!(!layout.reaches_internet("isolated"));
        assert!(layout.has_route("private", "public"));
        assert!(layout.reaches_internet("private"));
        assert!(layout.reaches_internet("public"));
        assert!(layout.has_route("isolated", "isolated"));
        assert!(!layout.has_route("nowhere", "nowhere"));
    }

    #[test]
    fn blocks_are_aligned_to_their_size() {
        let net = network(
            1,
            &[("public", TierKind::Public, 26), ("isolated", TierKind::Isolated, 24)],
        );
        let layout = SubnetLayout::plan(&net, "eu-west-1").unwrap();
        assert_eq!(layout.subnets()[0].cidr, "10.0.0.0/26");
        assert_eq!(layout.subnets()[1].cidr, "10.0.1.0/24");
    }

    #[test]
    fn exhausted_address_space_is_reported() {
        let mut net = network(6, &[("public", TierKind::Public, 18)]);
        net.cidr = "10.0.0.0/16".to_string();
        let err = SubnetLayout::plan(&net, "us-east-1").unwrap_err();
        assert!(matches!(err, GraphError::Layout(msg) if msg.contains("public-e")));
    }

    #[test]
    fn private_without_public_is_rejected() {
        let net = network(1, &[("private", TierKind::Private, 24)]);
        assert!(matches!(
            SubnetLayout::plan(&net, "us-east-1"),
            Err(GraphError::Layout(_))
        ));
    }
}
