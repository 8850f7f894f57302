//! nmap XML report parsing.
//!
//! Models only the parts of the `-oX` schema that carry service data; every
//! other element is ignored.

use crate::collab::fingerprint::ServiceRecord;
use crate::error::{AttemptResult, ProbeError};
use serde::Deserialize;

#[derive(Debug, Deserialize)]
struct NmapRun {
    #[serde(rename = "host", default)]
    hosts: Vec<Host>,
}

#[derive(Debug, Deserialize)]
struct Host {
    #[serde(default)]
    ports: Option<Ports>,
}

#[derive(Debug, Deserialize)]
struct Ports {
    #[serde(rename = "port", default)]
    ports: Vec<PortEntry>,
}

#[derive(Debug, Deserialize)]
struct PortEntry {
    #[serde(rename = "@portid")]
    portid: u16,
    #[serde(rename = "@protocol")]
    protocol: String,
    state: Option<PortState>,
    service: Option<Service>,
}

#[derive(Debug, Deserialize)]
struct PortState {
    #[serde(rename = "@state")]
    state: String,
}

#[derive(Debug, Deserialize)]
struct Service {
    #[serde(rename = "@name", default)]
    name: Option<String>,
    #[serde(rename = "@product", default)]
    product: Option<String>,
    #[serde(rename = "@version", default)]
    version: Option<String>,
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

/// Parse an nmap XML report into the records of its open ports.
pub fn parse(xml: &str) -> AttemptResult<Vec<ServiceRecord>> {
    let run: NmapRun = quick_xml::de::from_str(xml)
        .map_err(|e| ProbeError::MalformedResponse(format!("nmap XML: {e}")))?;

    Ok(run
        .hosts
        .into_iter()
        .filter_map(|host| host.ports)
        .flat_map(|ports| ports.ports)
        .filter(|port| port.state.as_ref().is_some_and(|s| s.state == "open"))
        .map(|port| {
            let (service_name, product, version) = match port.service {
                Some(svc) => (non_empty(svc.name), non_empty(svc.product), non_empty(svc.version)),
                None => (None, None, None),
            };
            ServiceRecord {
                port: port.portid,
                protocol: port.protocol,
                service_name,
                product,
                version,
            }
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;

    const REPORT: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<!DOCTYPE nmaprun>
<nmaprun scanner="nmap" args="nmap -sT -sV --top-ports 20 -T3 --open -oX - example.com" version="7.94">
  <scaninfo type="connect" protocol="tcp" numservices="20" services="21-23,25,53,80"/>
  <verbose level="0"/>
  <host starttime="1700000000" endtime="1700000020">
    <status state="up" reason="syn-ack"/>
    <address addr="192.0.2.10" addrtype="ipv4"/>
    <hostnames><hostname name="example.com" type="user"/></hostnames>
    <ports>
      <extraports state="closed" count="16"/>
      <port protocol="tcp" portid="22">
        <state state="open" reason="syn-ack" reason_ttl="0"/>
        <service name="ssh" product="OpenSSH" version="8.9p1" method="probed" conf="10"/>
      </port>
      <port protocol="tcp" portid="80">
        <state state="open" reason="syn-ack" reason_ttl="0"/>
        <service name="http" product="nginx" method="probed" conf="10"/>
      </port>
      <port protocol="tcp" portid="3306">
        <state state="filtered" reason="no-response" reason_ttl="0"/>
        <service name="mysql" method="table" conf="3"/>
      </port>
      <port protocol="tcp" portid="8443">
        <state state="open" reason="syn-ack" reason_ttl="0"/>
      </port>
    </ports>
  </host>
  <runstats><finished time="1700000020" elapsed="20.1"/></runstats>
</nmaprun>"#;

    #[test]
    fn test_only_open_ports_are_kept() {
        let records = parse(REPORT).unwrap();
        let ports: Vec<u16> = records.iter().map(|r| r.port).collect();
        assert_eq!(ports, vec![22, 80, 8443]);
    }

    #[test]
    fn test_service_fields() {
        let records = parse(REPORT).unwrap();
        assert_eq!(records[0].protocol, "tcp");
        assert_eq!(records[0].service_name.as_deref(), Some("ssh"));
        assert_eq!(records[0].product.as_deref(), Some("OpenSSH"));
        assert_eq!(records[0].version.as_deref(), Some("8.9p1"));
        assert_eq!(records[1].version, None);
        assert_eq!(records[2].service_name, None);
    }

    #[test]
    fn test_host_without_ports() {
        let xml = r#"<nmaprun><host><status state="down"/></host></nmaprun>"#;
        assert!(parse(xml).unwrap().is_empty());
    }

    #[test]
    fn test_malformed_report() {
        let err = parse("<nmaprun><host><ports><port portid=\"x\"").unwrap_err();
        assert!(matches!(err, ProbeError::MalformedResponse(_)));
    }
}
