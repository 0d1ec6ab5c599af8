/*!
 * First-name gender table.
 *
 * Maps lower-case first names to the share of bearers who are female.
 * The table is immutable once built and carries a version string so results
 * can be traced to the data that produced them. A JSON file of the form
 * `{"version": "...", "names": {"mary": 0.99, ...}}` can replace the
 * built-in table.
 */

use std::collections::HashMap;
use std::path::Path;

use serde::Deserialize;

use crate::errors::ConfigError;

/// Version of the built-in table
pub const BUILTIN_VERSION: &str = "builtin-2024.1";

const FEMALE_NAMES: &[&str] = &[
    "abigail", "ada", "agnes", "alice", "alicia", "amanda", "amber", "amelia", "amy", "andrea", "angela",
    "ann", "anna", "anne", "annie", "ava", "barbara", "beatrice", "betty", "beverly", "bonnie", "brenda",
    "bridget", "carla", "carmen", "carol", "caroline", "catherine", "charlotte", "cheryl", "chloe",
    "christina", "christine", "cindy", "claire", "clara", "claudia", "cynthia", "daisy", "deborah",
    "debra", "denise", "diana", "diane", "donna", "doris", "dorothy", "edith", "eleanor", "elena",
    "elizabeth", "ella", "ellen", "eloise", "emily", "emma", "erin", "esther", "eva", "evelyn", "fiona",
    "florence", "frances", "gloria", "grace", "hannah", "harriet", "heather", "helen", "holly", "irene",
    "isabel", "isabella", "jane", "janet", "janice", "jasmine", "jean", "jennifer", "jenny", "jessica",
    "joan", "joanna", "josephine", "joyce", "judith", "judy", "julia", "julie", "karen", "kate",
    "katherine", "kathleen", "kathy", "katie", "kim", "laura", "lauren", "leia", "lily", "linda", "lisa",
    "lois", "louise", "lucy", "lydia", "mabel", "madeline", "maggie", "margaret", "maria", "marie",
    "marilyn", "marion", "marjorie", "martha", "mary", "megan", "melanie", "melissa", "mia", "michelle",
    "mildred", "miranda", "molly", "monica", "nancy", "natalie", "nicole", "nina", "norma", "olivia",
    "pamela", "patricia", "paula", "peggy", "penelope", "phyllis", "rachel", "rebecca", "regina", "rita",
    "roberta", "rosa", "rose", "ruby", "ruth", "sally", "samantha", "sandra", "sara", "sarah", "sharon",
    "shirley", "sofia", "sophia", "sophie", "stephanie", "susan", "suzanne", "sylvia", "teresa",
    "theresa", "tiffany", "tina", "valerie", "vanessa", "victoria", "virginia", "vivian", "wanda",
    "wendy", "yvonne", "zoe",
];

const MALE_NAMES: &[&str] = &[
    "aaron", "adam", "alan", "albert", "alexander", "andrew", "anthony", "arthur", "benjamin", "bill",
    "billy", "bob", "bobby", "brandon", "brian", "bruce", "carl", "charles", "charlie", "christopher",
    "daniel", "david", "dennis", "donald", "douglas", "dylan", "edward", "eric", "ethan", "eugene",
    "frank", "fred", "gabriel", "gary", "george", "gerald", "gregory", "harold", "harry", "henry",
    "howard", "jack", "jacob", "james", "jason", "jeffrey", "jeremy", "jerry", "jim", "joe", "john",
    "jonathan", "jose", "joseph", "joshua", "juan", "justin", "keith", "kenneth", "kevin", "kyle",
    "larry", "lawrence", "louis", "luke", "marcus", "mark", "martin", "matthew", "michael", "mike",
    "nathan", "nicholas", "noah", "oliver", "patrick", "paul", "peter", "philip", "ralph", "randy",
    "raymond", "richard", "robert", "roger", "ronald", "roy", "russell", "ryan", "samuel", "scott",
    "sean", "stephen", "steve", "steven", "thomas", "timothy", "tom", "tony", "victor",
    "vincent", "walter", "wayne", "william", "willie", "zachary",
];

/// Names used for both genders, with their female share
const SHARED_NAMES: &[(&str, f32)] = &[
    ("alex", 0.25),
    ("ashley", 0.9),
    ("casey", 0.45),
    ("chris", 0.2),
    ("dana", 0.75),
    ("jamie", 0.55),
    ("jessie", 0.6),
    ("jordan", 0.3),
    ("kelly", 0.85),
    ("lee", 0.3),
    ("leslie", 0.8),
    ("morgan", 0.6),
    ("pat", 0.5),
    ("riley", 0.5),
    ("robin", 0.55),
    ("sam", 0.3),
    ("taylor", 0.6),
    ("terry", 0.3),
];

/// Result of a table lookup
#[derive(Debug, Clone, PartialEq)]
pub struct NameMatch {
    /// Table entry that matched
    pub name: String,
    /// Female share of the entry
    pub female_share: f32,
    /// Similarity to the query, 1.0 for exact hits
    pub similarity: f32,
}

impl NameMatch {
    pub fn is_fuzzy(&self) -> bool {
        self.similarity < 1.0
    }
}

#[derive(Debug, Deserialize)]
struct NameTableFile {
    version: String,
    names: HashMap<String, f32>,
}

/// Immutable, versioned name → female share table
#[derive(Debug, Clone)]
pub struct NameTable {
    version: String,
    entries: HashMap<String, f32>,
}

impl NameTable {
    /// Build a table from (name, female share) pairs
    pub fn from_pairs<I, S>(version: impl Into<String>, pairs: I) -> Self
    where
        I: IntoIterator<Item = (S, f32)>,
        S: AsRef<str>,
    {
        Self {
            version: version.into(),
            entries: pairs
                .into_iter()
                .map(|(name, share)| (name.as_ref().to_lowercase(), share.clamp(0.0, 1.0)))
                .collect(),
        }
    }

    /// The built-in English first-name table
    pub fn builtin() -> Self {
        let female = FEMALE_NAMES.iter().map(|n| (*n, 0.99));
        let male = MALE_NAMES.iter().map(|n| (*n, 0.01));
        let shared = SHARED_NAMES.iter().copied();
        Self::from_pairs(BUILTIN_VERSION, female.chain(male).chain(shared))
    }

    /// Load a table from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        let file: NameTableFile = serde_json::from_str(&content)
            .map_err(|e| ConfigError::Load(format!("{}: {}", path.display(), e)))?;
        if let Some((name, share)) = file.names.iter().find(|(_, share)| !(0.0..=1.0).contains(*share)) {
            return Err(ConfigError::invalid(
                "analysis.names_table",
                format!("female share for '{}' is {} (must be within 0..=1)", name, share),
            ));
        }
        Ok(Self::from_pairs(file.version, file.names))
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Exact lookup
    pub fn female_share(&self, name: &str) -> Option<f32> {
        self.entries.get(&name.to_lowercase()).copied()
    }

    /// Exact lookup, falling back to the closest entry with similarity at
    /// or above `threshold`. Names shorter than `min_fuzzy_len` are only
    /// matched exactly.
    pub fn lookup(&self, name: &str, threshold: f32, min_fuzzy_len: usize) -> Option<NameMatch> {
        let name = name.to_lowercase();
        if let Some(&share) = self.entries.get(&name) {
            return Some(NameMatch {
                name,
                female_share: share,
                similarity: 1.0,
            });
        }
        if name.chars().count() < min_fuzzy_len {
            return None;
        }

        let mut best: Option<(&String, f32, f32)> = None;
        for (entry, &share) in &self.entries {
            let sim = similarity(&name, entry);
            if sim < threshold {
                continue;
            }
            // Ties go to the alphabetically first entry so lookups are stable
            let better = match best {
                None => true,
                Some((best_name, best_sim, _)) => sim > best_sim || (sim == best_sim && entry < best_name),
            };
            if better {
                best = Some((entry, sim, share));
            }
        }

        best.map(|(entry, sim, share)| NameMatch {
            name: entry.clone(),
            female_share: share,
            similarity: sim,
        })
    }
}

impl Default for NameTable {
    fn default() -> Self {
        Self::builtin()
    }
}

/// Normalized Levenshtein similarity (0.0-1.0)
pub fn similarity(a: &str, b: &str) -> f32 {
    if a.is_empty() && b.is_empty() {
        return 1.0;
    }
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    let distance = levenshtein_distance(a, b);
    let max_len = a.chars().count().max(b.chars().count());
    1.0 - (distance as f32 / max_len as f32)
}

/// Calculate Levenshtein distance between two strings
fn levenshtein_distance(a: &str, b: &str) -> usize {
    let a_chars: Vec<char> = a.chars().collect();
    let b_chars: Vec<char> = b.chars().collect();

    if a_chars.is_empty() {
        return b_chars.len();
    }
    if b_chars.is_empty() {
        return a_chars.len();
    }

    let mut prev_row: Vec<usize> = (0..=b_chars.len()).collect();
    let mut curr_row: Vec<usize> = vec![0; b_chars.len() + 1];

    for (i, a_char) in a_chars.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, b_char) in b_chars.iter().enumerate() {
            let cost = usize::from(a_char != b_char);
            curr_row[j + 1] = (prev_row[j + 1] + 1).min(curr_row[j] + 1).min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[b_chars.len()]
}
