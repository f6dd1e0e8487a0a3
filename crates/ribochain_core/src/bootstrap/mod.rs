//! The bootstrap directory client: announces this agent's address and
//! discovers existing peers for a DNA.
//! A real DHT join still goes through `TransportT::peer_add` for each
//! discovered peer; this module only knows how to talk to the directory
//! server and how to turn its replies into multiaddrs.

use crate::context::Context;
use crate::error::{CoreError, CoreResult};
use reqwest::Client;
use ribochain_types::{Hash, PeerId};
use serde::{Deserialize, Serialize};
use url2::url2;

#[derive(Serialize)]
struct AnnounceBody<'a> {
    #[serde(rename = "Version")]
    version: u32,
    #[serde(rename = "NodeID")]
    node_id: &'a str,
    #[serde(rename = "NodeAddr")]
    node_addr: &'a str,
    #[serde(rename = "ReturnAddr", skip_serializing_if = "Option::is_none")]
    return_addr: Option<&'a str>,
}

#[derive(Clone, Debug, Deserialize)]
struct BootstrapReq {
    #[serde(rename = "NodeID")]
    node_id: String,
    #[serde(rename = "NodeAddr")]
    node_addr: String,
    #[serde(rename = "ReturnAddr")]
    return_addr: Option<String>,
}

#[derive(Clone, Debug, Deserialize)]
struct BootstrapEntry {
    #[serde(rename = "Req")]
    req: BootstrapReq,
    #[serde(rename = "Remote")]
    remote: String,
    #[serde(rename = "LastSeen")]
    #[allow(dead_code)]
    last_seen: String,
}

/// A peer discovered through the bootstrap server, resolved to a concrete
/// dialable address.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DiscoveredPeer {
    pub peer: PeerId,
    pub multiaddr: String,
}

/// Split a `host:port` pair, defaulting the port to `"0"` if `addr` carries
/// no colon.
fn split_host_port(addr: &str) -> (&str, &str) {
    match addr.rsplit_once(':') {
        Some((host, port)) => (host, port),
        None => (addr, "0"),
    }
}

/// Build the dialable multi-address for a discovered peer: an explicit
/// `ReturnAddr` always wins, host and port both (the peer is behind NAT and
/// has told us how to reach it); otherwise take the observed source IP's
/// host (`Remote`, which the directory server itself saw, so it can't be
/// spoofed) and the port the peer's self-reported `NodeAddr` multiaddr
/// advertises.
fn synthesize_multiaddr(remote: &str, node_addr: &str, return_addr: Option<&str>) -> String {
    let (host, port) = match return_addr {
        Some(ra) => split_host_port(ra),
        None => {
            let (host, _) = split_host_port(remote);
            let port = node_addr.rsplit('/').next().unwrap_or("0");
            (host, port)
        }
    };
    format!("/ip4/{host}/tcp/{port}")
}

fn parse_entries(bytes: &[u8]) -> CoreResult<Vec<BootstrapEntry>> {
    serde_json::from_slice(bytes).map_err(|e| CoreError::Bootstrap(format!("malformed bootstrap response: {e}")))
}

/// Turn a directory server's raw JSON reply into discovered peers, skipping
/// `self_peer` (the directory always echoes back our own prior
/// announcement too).
fn entries_to_peers(entries: Vec<BootstrapEntry>, self_peer: &PeerId) -> Vec<DiscoveredPeer> {
    entries
        .into_iter()
        .filter(|e| e.req.node_id != self_peer.0)
        .map(|e| {
            let multiaddr = synthesize_multiaddr(&e.remote, &e.req.node_addr, e.req.return_addr.as_deref());
            DiscoveredPeer { peer: PeerId(e.req.node_id), multiaddr }
        })
        .collect()
}

pub struct BootstrapClient {
    http: Client,
    base_url: String,
    dna_hash: Hash,
    self_peer: PeerId,
    self_node_addr: String,
    return_addr: Option<String>,
}

impl BootstrapClient {
    pub fn new(base_url: impl Into<String>, dna_hash: Hash, self_peer: PeerId, self_node_addr: impl Into<String>, ctx: &Context) -> Self {
        Self {
            http: Client::new(),
            base_url: base_url.into(),
            dna_hash,
            self_peer,
            self_node_addr: self_node_addr.into(),
            return_addr: ctx.config.bootstrap_return_addr.clone(),
        }
    }

    /// `POST http://<host>/<DNAHash>/<NodeID>`.
    pub async fn announce(&self) -> CoreResult<()> {
        let url = url2!("{}/{}/{}", self.base_url, self.dna_hash, self.self_peer);
        let body = AnnounceBody {
            version: 1,
            node_id: &self.self_peer.0,
            node_addr: &self.self_node_addr,
            return_addr: self.return_addr.as_deref(),
        };
        self.http
            .post(url.as_str())
            .json(&body)
            .send()
            .await
            .map_err(|e| CoreError::Bootstrap(e.to_string()))?;
        Ok(())
    }

    /// `GET http://<host>/<DNAHash>`, then hand every discovered peer's
    /// address to `ctx.transport.peer_add`.
    pub async fn discover(&self, ctx: &Context) -> CoreResult<Vec<PeerId>> {
        let url = url2!("{}/{}", self.base_url, self.dna_hash);
        let resp = self.http.get(url.as_str()).send().await.map_err(|e| CoreError::Bootstrap(e.to_string()))?;
        let bytes = resp.bytes().await.map_err(|e| CoreError::Bootstrap(e.to_string()))?;
        let entries = parse_entries(&bytes)?;
        let peers = entries_to_peers(entries, &self.self_peer);

        let mut ids = Vec::with_capacity(peers.len());
        for discovered in peers {
            ctx.transport.peer_add(discovered.peer.clone(), discovered.multiaddr).await?;
            ids.push(discovered.peer);
        }
        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn return_addr_overrides_synthesized_address_host_and_port() {
        let addr = synthesize_multiaddr("203.0.113.5:9000", "/ip4/10.0.0.2/tcp/9000", Some("198.51.100.7:4321"));
        assert_eq!(addr, "/ip4/198.51.100.7/tcp/4321");
    }

    #[test]
    fn falls_back_to_remote_host_with_node_addr_port() {
        let addr = synthesize_multiaddr("203.0.113.5:1234", "/ip4/10.0.0.2/tcp/9000", None);
        assert_eq!(addr, "/ip4/203.0.113.5/tcp/9000");
    }

    /// The worked example from the bootstrap discovery scenario: a
    /// `ReturnAddr` of `5.6.7.8:4001` against a `NodeAddr` of
    /// `/ip4/1.2.3.4/tcp/4001` and a `Remote` of `9.9.9.9:1234` must produce
    /// `/ip4/5.6.7.8/tcp/4001`.
    #[test]
    fn scenario_literal_values_produce_the_expected_multiaddr() {
        let addr = synthesize_multiaddr("9.9.9.9:1234", "/ip4/1.2.3.4/tcp/4001", Some("5.6.7.8:4001"));
        assert_eq!(addr, "/ip4/5.6.7.8/tcp/4001");
    }

    #[test]
    fn parses_directory_response_and_drops_self() {
        let payload = br#"[
            {
                "Req": {"NodeID": "alice:abc", "NodeAddr": "/ip4/10.0.0.1/tcp/9000", "ReturnAddr": null},
                "Remote": "198.51.100.1:5000",
                "LastSeen": "2026-01-01T00:00:00Z"
            },
            {
                "Req": {"NodeID": "bob:def", "NodeAddr": "/ip4/10.0.0.2/tcp/9001", "ReturnAddr": "203.0.113.9:4001"},
                "Remote": "198.51.100.2:5001",
                "LastSeen": "2026-01-01T00:00:01Z"
            }
        ]"#;
        let entries = parse_entries(payload).unwrap();
        let peers = entries_to_peers(entries, &PeerId("alice:abc".into()));
        assert_eq!(peers.len(), 1);
        assert_eq!(peers[0].peer, PeerId("bob:def".into()));
        assert_eq!(peers[0].multiaddr, "/ip4/203.0.113.9/tcp/4001");
    }
}
