//! Static metadata for knowledge record attributes.
//!
//! Every attribute a knowledge record may carry is listed here with its kind.
//! The filter builder, the record decoder and the query backends all consult
//! this table instead of inspecting records at runtime, so a field name that
//! reaches SQL has always come from this list.

use std::collections::HashMap;
use std::sync::OnceLock;

/// Name of the identifier attribute.
pub const ID: &str = "id";
pub const TITLE: &str = "title";
pub const TAGS: &str = "tags";
pub const CONTENT: &str = "content";
pub const ABSTRACT: &str = "abstract";
pub const AUTHOR: &str = "author";
pub const KNOWLEDGE_TYPE: &str = "knowledgeType";
pub const TACTICS_ID: &str = "tacticsId";
pub const TECHNIQUES_ID: &str = "techniquesId";
pub const SUB_TECHNIQUES_ID: &str = "subTechniquesId";

/// Shape of an attribute value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    /// The record identifier.
    Identifier,
    /// A free-text scalar string.
    Text,
    /// An ordered list of strings.
    List,
}

/// How a populated filter value is matched against stored records.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MatchKind {
    Exact,
    Pattern,
    AnyOf,
}

impl FieldKind {
    pub fn match_kind(self) -> MatchKind {
        match self {
            FieldKind::Identifier => MatchKind::Exact,
            FieldKind::Text => MatchKind::Pattern,
            FieldKind::List => MatchKind::AnyOf,
        }
    }
}

/// One entry of the attribute table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FieldSpec {
    pub name: &'static str,
    pub kind: FieldKind,
}

const fn text(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::Text,
    }
}

const fn list(name: &'static str) -> FieldSpec {
    FieldSpec {
        name,
        kind: FieldKind::List,
    }
}

/// All record attributes except the identifier.
pub const FIELDS: &[FieldSpec] = &[
    text(TITLE),
    list(TAGS),
    list(TECHNIQUES_ID),
    list(TACTICS_ID),
    list(KNOWLEDGE_TYPE),
    list("knowledgeSource"),
    text("confidentiality"),
    text(ABSTRACT),
    text(CONTENT),
    text("detection"),
    text("mitigations"),
    text("recommendations"),
    text("directory"),
    text("techniques"),
    text("tactics"),
    text("usedExploits"),
    text("alias"),
    text("vulType"),
    text("affiliation"),
    text("usedTools"),
    text("strategicCapability"),
    text("firstActivity"),
    text("latestActivity"),
    text("targetedGeography"),
    text("timeLine"),
    text("scenario"),
    text("motivations"),
    text("targetedIndustry"),
    text("preparation"),
    text("alert"),
    text("analysis"),
    text("traces"),
    text("containment"),
    text("eradication"),
    text("recovery"),
    text("followUp"),
    text("disposalProcess"),
    text("cases"),
    text("cve"),
    text("cnnvd"),
    text("cwd"),
    text("cvss"),
    text("bugtraq"),
    text("cvssStr"),
    text("msf"),
    text("exploitdb"),
    text("isExp"),
    text("vendor"),
    text("appType"),
    text("consequence"),
    text("fingerPrint"),
    list("revisionDate"),
    text("products"),
    text("reference"),
    list(AUTHOR),
    text("uid"),
    list(SUB_TECHNIQUES_ID),
    list("platforms"),
    text("affectedVerison"),
    text("threatSeverity"),
    text("solution"),
    text("cnvd"),
    text("cwe"),
    text("appName"),
    text("organizationIds"),
    text("IoC"),
    text("TiName"),
    text("inputParameters"),
    text("outputParameters"),
];

const ID_SPEC: FieldSpec = FieldSpec {
    name: ID,
    kind: FieldKind::Identifier,
};

fn index() -> &'static HashMap<&'static str, FieldSpec> {
    static INDEX: OnceLock<HashMap<&'static str, FieldSpec>> = OnceLock::new();
    INDEX.get_or_init(|| {
        FIELDS
            .iter()
            .chain(std::iter::once(&ID_SPEC))
            .map(|spec| (spec.name, *spec))
            .collect()
    })
}

/// Looks up an attribute by its wire name. Names are case-sensitive.
pub fn lookup(name: &str) -> Option<FieldSpec> {
    index().get(name).copied()
}

/// Looks up an attribute that can be stored in a record body (not the id).
pub fn lookup_attribute(name: &str) -> Option<FieldSpec> {
    lookup(name).filter(|spec| spec.kind != FieldKind::Identifier)
}
