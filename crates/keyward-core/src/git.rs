//! Git commit and tag payloads
//!
//! A workstation sends the fields of the commit or tag it wants signed.
//! The signed payload is the canonical git object text without a
//! signature; the commit id recorded for audit is the SHA-1 of the full
//! object with the ASCII-armored signature in a `gpgsig` header.

use crate::encoding::{base64_bytes, to_base64};
use serde::{Deserialize, Serialize};
use sha1::{Digest, Sha1};

const ARMOR_BEGIN: &str = "-----BEGIN PGP SIGNATURE-----";
const ARMOR_END: &str = "-----END PGP SIGNATURE-----";
const ARMOR_LINE_WIDTH: usize = 64;

const CRC24_INIT: u32 = 0x00B7_04CE;
const CRC24_POLY: u32 = 0x0186_4CFB;

/// Commit fields as sent by the workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CommitInfo {
    pub tree: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent: Option<String>,

    pub author: String,
    pub committer: String,

    /// Raw message bytes, including the leading blank line
    #[serde(with = "base64_bytes")]
    pub message: Vec<u8>,
}

impl CommitInfo {
    /// Header lines shared by the signed payload and the hashed object
    fn headers(&self) -> String {
        let mut out = format!("tree {}\n", self.tree);
        if let Some(parent) = &self.parent {
            out.push_str(&format!("parent {}\n", parent));
        }
        out.push_str(&format!("author {}\n", self.author));
        out.push_str(&format!("committer {}\n", self.committer));
        out
    }

    /// Bytes covered by the signature
    pub fn signed_payload(&self) -> Vec<u8> {
        let mut out = self.headers().into_bytes();
        out.extend_from_slice(&self.message);
        out
    }

    /// Git object id of the commit once `armored_signature` is embedded
    pub fn commit_hash(&self, armored_signature: &str) -> Vec<u8> {
        let mut body = self.headers().into_bytes();
        body.extend_from_slice(b"gpgsig ");
        body.extend_from_slice(armored_signature.replace('\n', "\n ").as_bytes());
        body.push(b'\n');
        body.extend_from_slice(&self.message);
        object_hash("commit", &body)
    }

    /// First line of the message, for display
    pub fn summary(&self) -> String {
        String::from_utf8_lossy(&self.message)
            .lines()
            .find(|l| !l.trim().is_empty())
            .unwrap_or_default()
            .to_string()
    }
}

/// Tag fields as sent by the workstation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TagInfo {
    pub object: String,

    #[serde(rename = "type")]
    pub object_type: String,

    pub tag: String,
    pub tagger: String,

    #[serde(with = "base64_bytes")]
    pub message: Vec<u8>,
}

impl TagInfo {
    /// Bytes covered by the signature
    pub fn signed_payload(&self) -> Vec<u8> {
        let mut out = format!(
            "object {}\ntype {}\ntag {}\ntagger {}\n",
            self.object, self.object_type, self.tag, self.tagger
        )
        .into_bytes();
        out.extend_from_slice(&self.message);
        out
    }

    /// Git object id of the tag with the armored signature appended
    pub fn tag_hash(&self, armored_signature: &str) -> Vec<u8> {
        let mut body = self.signed_payload();
        body.extend_from_slice(armored_signature.as_bytes());
        body.push(b'\n');
        object_hash("tag", &body)
    }
}

/// Either a commit or a tag
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GitInfo {
    Commit(CommitInfo),
    Tag(TagInfo),
}

impl GitInfo {
    pub fn signed_payload(&self) -> Vec<u8> {
        match self {
            GitInfo::Commit(commit) => commit.signed_payload(),
            GitInfo::Tag(tag) => tag.signed_payload(),
        }
    }

    pub fn subtitle(&self) -> &'static str {
        match self {
            GitInfo::Commit(_) => "Git Commit",
            GitInfo::Tag(_) => "Git Tag",
        }
    }
}

fn object_hash(kind: &str, body: &[u8]) -> Vec<u8> {
    let mut hasher = Sha1::new();
    hasher.update(format!("{} {}\0", kind, body.len()).as_bytes());
    hasher.update(body);
    hasher.finalize().to_vec()
}

/// OpenPGP CRC-24 checksum
pub fn crc24(data: &[u8]) -> u32 {
    let mut crc = CRC24_INIT;
    for byte in data {
        crc ^= (*byte as u32) << 16;
        for _ in 0..8 {
            crc <<= 1;
            if crc & 0x0100_0000 != 0 {
                crc ^= CRC24_POLY;
            }
        }
    }
    crc & 0x00FF_FFFF
}

/// ASCII-armor a signature packet as a `PGP SIGNATURE` block
pub fn armor_signature(packet: &[u8], comment: Option<&str>) -> String {
    let mut out = String::from(ARMOR_BEGIN);
    out.push('\n');
    if let Some(comment) = comment {
        out.push_str("Comment: ");
        out.push_str(comment);
        out.push('\n');
    }
    out.push('\n');

    let encoded = to_base64(packet);
    let lines: Vec<&str> = encoded
        .as_bytes()
        .chunks(ARMOR_LINE_WIDTH)
        .map(|chunk| std::str::from_utf8(chunk).unwrap_or_default())
        .collect();
    out.push_str(&lines.join("\n"));

    let crc = crc24(packet).to_be_bytes();
    out.push_str("\n=");
    out.push_str(&to_base64(&crc[1..]));
    out.push('\n');
    out.push_str(ARMOR_END);
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encoding::from_base64;

    const PACKET: &str = "iF4EABYKAAYFAlkkmD8ACgkQ4eT0x9ceFp1gNQD+LWiJFax8iQqgr0yJ1P7JFGvMwuZc8r05h6U+X+lyKYEBAK939lEX1rvBmcetftVbRlOMX5oQZwBLt/NJh+nQ3ssC";

    fn commit() -> CommitInfo {
        CommitInfo {
            tree: "2c4df4a89ac5b0b8b21fd2aad4d9b19cd91e7049".into(),
            parent: Some("1cd97d0545a25c578e3f4da5283106606276eadf".into()),
            author: "Alex Grinman <alex@krypt.co> 1495570495 -0400".into(),
            committer: "Alex Grinman <alex@krypt.co> 1495570495 -0400".into(),
            message: b"\ntest1234\n".to_vec(),
        }
    }

    #[test]
    fn test_armor_layout() {
        let packet = from_base64(PACKET).unwrap();
        let armored = armor_signature(&packet, None);

        assert!(armored.starts_with("-----BEGIN PGP SIGNATURE-----\n\n"));
        assert!(armored.ends_with("\n=13qB\n-----END PGP SIGNATURE-----"));
        for line in armored.lines() {
            assert!(line.len() <= ARMOR_LINE_WIDTH);
        }
    }

    #[test]
    fn test_armor_with_comment() {
        let armored = armor_signature(b"sig", Some("hello"));
        assert!(armored.starts_with("-----BEGIN PGP SIGNATURE-----\nComment: hello\n\n"));
    }

    #[test]
    fn test_commit_hash_matches_git() {
        let packet = from_base64(PACKET).unwrap();
        let armored = armor_signature(&packet, None);
        let hash = commit().commit_hash(&armored);
        assert_eq!(hex::encode(hash), "8dc196466d59bf4a86d3725e7dd29a1c357c8117");
    }

    #[test]
    fn test_commit_signed_payload() {
        let payload = commit().signed_payload();
        let text = String::from_utf8(payload).unwrap();
        assert!(text.starts_with("tree 2c4df4a89ac5b0b8b21fd2aad4d9b19cd91e7049\nparent "));
        assert!(text.ends_with("-0400\n\ntest1234\n"));
        assert!(!text.contains("gpgsig"));
    }

    #[test]
    fn test_root_commit_has_no_parent_line() {
        let mut root = commit();
        root.parent = None;
        let text = String::from_utf8(root.signed_payload()).unwrap();
        assert!(!text.contains("parent"));
    }

    #[test]
    fn test_git_info_wire_shape() {
        let info = GitInfo::Commit(commit());
        let value = serde_json::to_value(&info).unwrap();
        assert!(value.get("commit").is_some());
        assert_eq!(value["commit"]["message"], "CnRlc3QxMjM0Cg==");

        let both = serde_json::json!({ "commit": value["commit"].clone(), "tag": {} });
        assert!(serde_json::from_value::<GitInfo>(both).is_err());
    }

    #[test]
    fn test_tag_payload() {
        let tag = TagInfo {
            object: "2c4df4a89ac5b0b8b21fd2aad4d9b19cd91e7049".into(),
            object_type: "commit".into(),
            tag: "v1.0".into(),
            tagger: "Dev <dev@example.com> 1495570495 -0400".into(),
            message: b"\nrelease\n".to_vec(),
        };
        let text = String::from_utf8(tag.signed_payload()).unwrap();
        assert!(text.starts_with("object 2c4df4a89ac5b0b8b21fd2aad4d9b19cd91e7049\ntype commit\ntag v1.0\n"));
        assert_eq!(tag.tag_hash("sig").len(), 20);
    }

    #[test]
    fn test_summary() {
        assert_eq!(commit().summary(), "test1234");
    }
}
