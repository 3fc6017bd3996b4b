// SPDX-FileCopyrightText: 2025 RAprogramm <andrey.rozanov.vl@gmail.com>
//
// SPDX-License-Identifier: MIT

//! Analysis of the instrumentation manifest published by the OpenTelemetry
//! Java instrumentation project.
//!
//! The manifest lists instrumentation library entries. Each entry is reduced
//! to an [`InstrumentationEntry`] and the entries are folded into an
//! [`InstrumentationSummary`]. The fold is order-independent and recomputed
//! from scratch on every run.
//!
//! Accepted document shapes:
//!
//! * a top-level sequence of entries;
//! * a mapping whose `libraries` key holds either a sequence of entries or a
//!   mapping of category name to a sequence of entries, with optional
//!   `internal` and `custom` sequences folded the same way;
//! * an empty document, `null`, or a mapping without any of those keys, all of
//!   which yield zero counts.

use std::collections::BTreeSet;

use serde::Serialize;
use serde_yaml::{Mapping, Value};

use crate::{
    error::Error,
    observation::{
        LIBRARIES_TOTAL, LIBRARIES_WITH_DESCRIPTION, LIBRARIES_WITH_JAVAAGENT,
        LIBRARIES_WITH_LIBRARY, LIBRARIES_WITH_TELEMETRY_CONFIG, MetricObservation,
    },
};

/// Target version key for Java agent instrumentation.
pub const TARGET_JAVAAGENT: &str = "javaagent";
/// Target version key for standalone library instrumentation.
pub const TARGET_LIBRARY: &str = "library";

const SECTION_LIBRARIES: &str = "libraries";
const SECTION_INTERNAL: &str = "internal";
const SECTION_CUSTOM: &str = "custom";

const FIELD_DESCRIPTION: &str = "description";
const FIELD_TARGET_VERSIONS: &str = "target_versions";
const FIELD_TARGET_VERSION: &str = "target_version";
const FIELD_TELEMETRY: &str = "telemetry";

/// A single manifest record reduced to the facts that are counted.
#[derive(Debug, Clone, Default, PartialEq, Eq,)]
pub struct InstrumentationEntry
{
    /// Whether the entry has a non-empty description.
    pub has_description:      bool,
    /// Targets the entry declares versions for, e.g. `javaagent`.
    pub target_versions:      BTreeSet<String,>,
    /// Whether the entry declares non-empty telemetry configuration.
    pub has_telemetry_config: bool,
}

impl InstrumentationEntry
{
    /// Returns `true` when the entry declares versions for `target`.
    pub fn has_target(&self, target: &str,) -> bool
    {
        self.target_versions.contains(target,)
    }
}

impl From<&Mapping,> for InstrumentationEntry
{
    /// Reads the counted fields by string key; keys of any other type are
    /// ignored.
    fn from(mapping: &Mapping,) -> Self
    {
        let present = |key: &str| mapping.get(key,).is_some_and(is_present,);
        let targets =
            mapping.get(FIELD_TARGET_VERSIONS,).or_else(|| mapping.get(FIELD_TARGET_VERSION,),);

        Self {
            has_description:      present(FIELD_DESCRIPTION,),
            target_versions:      targets.map(target_set,).unwrap_or_default(),
            has_telemetry_config: present(FIELD_TELEMETRY,),
        }
    }
}

/// Aggregate counts over every entry of one manifest.
///
/// Every sub-count is a filter count over the same entry list and therefore
/// never exceeds [`total_count`](Self::total_count).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize,)]
pub struct InstrumentationSummary
{
    /// Number of entries.
    pub total_count:            u64,
    /// Entries with a description.
    pub with_description_count: u64,
    /// Entries targeting the Java agent.
    pub with_javaagent_count:   u64,
    /// Entries targeting standalone library instrumentation.
    pub with_library_count:     u64,
    /// Entries declaring telemetry configuration.
    pub with_telemetry_count:   u64,
}

impl InstrumentationSummary
{
    /// Folds entries into a summary.
    pub fn from_entries<'a, I,>(entries: I,) -> Self
    where
        I: IntoIterator<Item = &'a InstrumentationEntry,>,
    {
        entries.into_iter().fold(Self::default(), |mut summary, entry| {
            summary.total_count += 1;
            summary.with_description_count += u64::from(entry.has_description,);
            summary.with_javaagent_count += u64::from(entry.has_target(TARGET_JAVAAGENT,),);
            summary.with_library_count += u64::from(entry.has_target(TARGET_LIBRARY,),);
            summary.with_telemetry_count += u64::from(entry.has_telemetry_config,);
            summary
        },)
    }

    /// Maps the summary onto the global instrumentation gauges.
    pub fn observations(&self,) -> Vec<MetricObservation,>
    {
        vec![
            MetricObservation::new(LIBRARIES_TOTAL, self.total_count,),
            MetricObservation::new(LIBRARIES_WITH_DESCRIPTION, self.with_description_count,),
            MetricObservation::new(LIBRARIES_WITH_JAVAAGENT, self.with_javaagent_count,),
            MetricObservation::new(LIBRARIES_WITH_LIBRARY, self.with_library_count,),
            MetricObservation::new(LIBRARIES_WITH_TELEMETRY_CONFIG, self.with_telemetry_count,),
        ]
    }
}

/// Parses manifest YAML into its entries.
///
/// # Errors
///
/// Returns [`Error::Parse`] for malformed YAML and [`Error::ManifestShape`]
/// when the document or one of its entries has an unexpected structure.
pub fn parse_manifest(yaml: &str,) -> Result<Vec<InstrumentationEntry,>, Error,>
{
    if yaml.trim().is_empty() {
        return Ok(Vec::new(),);
    }

    let document: Value = serde_yaml::from_str(yaml,)?;
    let mut entries = Vec::new();
    collect_document(&document, &mut entries,)?;

    Ok(entries,)
}

/// Parses manifest YAML and folds it into an [`InstrumentationSummary`].
///
/// # Errors
///
/// Propagates the errors of [`parse_manifest`].
///
/// # Examples
///
/// ```
/// use github_metrics::analyze_manifest;
///
/// let yaml = r#"[{description: "x", target_versions: ["javaagent"]}, {target_versions: ["library"]}, {}]"#;
/// let summary = analyze_manifest(yaml,)?;
/// assert_eq!(summary.total_count, 3);
/// assert_eq!(summary.with_description_count, 1);
/// assert_eq!(summary.with_telemetry_count, 0);
/// # Ok::<(), github_metrics::Error>(())
/// ```
pub fn analyze_manifest(yaml: &str,) -> Result<InstrumentationSummary, Error,>
{
    let entries = parse_manifest(yaml,)?;
    Ok(InstrumentationSummary::from_entries(&entries,),)
}

fn collect_document(
    document: &Value,
    entries: &mut Vec<InstrumentationEntry,>,
) -> Result<(), Error,>
{
    match document {
        Value::Null => Ok((),),
        Value::Sequence(_,) => collect_sequence("manifest", document, entries,),
        Value::Mapping(mapping,) => {
            if let Some(libraries,) = mapping.get(SECTION_LIBRARIES,) {
                collect_libraries(libraries, entries,)?;
            }
            for section in [SECTION_INTERNAL, SECTION_CUSTOM] {
                if let Some(value,) = mapping.get(section,) {
                    collect_sequence(section, value, entries,)?;
                }
            }
            Ok((),)
        }
        Value::Tagged(tagged,) => collect_document(&tagged.value, entries,),
        Value::Bool(_,) | Value::Number(_,) | Value::String(_,) => Err(Error::manifest_shape(
            "expected a sequence of entries or a mapping with a 'libraries' key",
        ),),
    }
}

fn collect_libraries(libraries: &Value, entries: &mut Vec<InstrumentationEntry,>,) -> Result<(), Error,>
{
    match untagged(libraries,) {
        Value::Mapping(categories,) => {
            for (category, items,) in categories {
                let name = category.as_str().unwrap_or("<non-string key>",);
                collect_sequence(&format!("{SECTION_LIBRARIES}.{name}"), items, entries,)?;
            }
            Ok((),)
        }
        other => collect_sequence(SECTION_LIBRARIES, other, entries,),
    }
}

fn collect_sequence(
    section: &str,
    value: &Value,
    entries: &mut Vec<InstrumentationEntry,>,
) -> Result<(), Error,>
{
    let items = match untagged(value,) {
        Value::Null => return Ok((),),
        Value::Sequence(items,) => items,
        _ => {
            return Err(Error::manifest_shape(format!("'{section}' must be a sequence of entries"),),);
        }
    };

    entries.reserve(items.len(),);
    for (index, item,) in items.iter().enumerate() {
        let mapping = untagged(item,).as_mapping().ok_or_else(|| {
            Error::manifest_shape(format!("entry {index} in '{section}' must be a mapping"),)
        },)?;
        entries.push(InstrumentationEntry::from(mapping,),);
    }

    Ok((),)
}

fn untagged(value: &Value,) -> &Value
{
    match value {
        Value::Tagged(tagged,) => untagged(&tagged.value,),
        other => other,
    }
}

/// Truthiness used by every predicate: null, `false` and empty values count
/// as absent.
fn is_present(value: &Value,) -> bool
{
    match value {
        Value::Null => false,
        Value::Bool(flag,) => *flag,
        Value::Number(_,) => true,
        Value::String(text,) => !text.trim().is_empty(),
        Value::Sequence(items,) => !items.is_empty(),
        Value::Mapping(mapping,) => !mapping.is_empty(),
        Value::Tagged(tagged,) => is_present(&tagged.value,),
    }
}

/// Target versions are either a list of target names or a mapping keyed by
/// target; in the mapping form only keys with a non-empty value count.
fn target_set(value: &Value,) -> BTreeSet<String,>
{
    match value {
        Value::Sequence(items,) => items
            .iter()
            .filter_map(Value::as_str,)
            .map(str::trim,)
            .filter(|target| !target.is_empty(),)
            .map(str::to_owned,)
            .collect(),
        Value::Mapping(mapping,) => mapping
            .iter()
            .filter(|(_, versions,)| is_present(versions,),)
            .filter_map(|(target, _,)| target.as_str(),)
            .map(str::to_owned,)
            .collect(),
        Value::String(target,) if !target.trim().is_empty() => {
            BTreeSet::from([target.trim().to_owned(),],)
        }
        Value::Tagged(tagged,) => target_set(&tagged.value,),
        _ => BTreeSet::new(),
    }
}

#[cfg(test)]
mod tests
{
    use proptest::prelude::*;
    use serde_yaml::{Mapping, Value};

    use super::*;
    use crate::observation::MetricValue;

    fn summary(total: u64, description: u64, javaagent: u64, library: u64, telemetry: u64,)
    -> InstrumentationSummary
    {
        InstrumentationSummary {
            total_count:            total,
            with_description_count: description,
            with_javaagent_count:   javaagent,
            with_library_count:     library,
            with_telemetry_count:   telemetry,
        }
    }

    #[test]
    fn flow_sequence_example()
    {
        let yaml =
            r#"[{description: "x", target_versions: ["javaagent"]}, {target_versions: ["library"]}, {}]"#;
        let result = analyze_manifest(yaml,).expect("valid manifest",);
        assert_eq!(result, summary(3, 1, 1, 1, 0));
    }

    #[test]
    fn categorized_manifest_folds_every_section()
    {
        let yaml = r#"
file_format: 0.1
libraries:
  activej:
  - name: activej-http-6.0
    description: Instruments the ActiveJ HTTP server.
    source_path: instrumentation/activej-http-6.0
    target_versions:
      javaagent:
      - io.activej:activej-http:[6.0,)
    telemetry:
    - when: default
      metrics:
      - name: http.server.request.duration
  akka:
  - name: akka-actor-2.3
    target_versions:
      javaagent:
      - com.typesafe.akka:akka-actor_2.11:[2.3,)
      library:
      - com.typesafe.akka:akka-actor_2.11:2.3.0
  - name: akka-http-10.0
    description: ""
    target_versions:
      library: []
internal:
- name: internal-class-loader
  description: Internal class loader helpers.
custom:
- name: opentelemetry-instrumentation-annotations
  target_versions:
    javaagent:
    - io.opentelemetry:opentelemetry-instrumentation-annotations
  telemetry: []
"#;
        let result = analyze_manifest(yaml,).expect("valid manifest",);
        assert_eq!(result, summary(5, 2, 3, 1, 1));
    }

    #[test]
    fn flat_libraries_list_accepts_singular_target_key()
    {
        let yaml = r#"
libraries:
  - name: Library A
    description: This is a description.
    target_version:
      javaagent: 1.0.0
      library: 2.0.0
    telemetry: true
  - name: Library B
    target_version:
      javaagent: 1.1.0
    telemetry: false
  - name: Library C
    description: Another description.
    target_version:
      library: 2.1.0
  - name: Library D
  - name: Library E
    description: Yet another description.
    telemetry: {}
"#;
        let result = analyze_manifest(yaml,).expect("valid manifest",);
        assert_eq!(result, summary(5, 3, 2, 2, 1));
    }

    #[test]
    fn empty_inputs_yield_zero_counts()
    {
        for yaml in ["", "   \n", "~", "libraries: []", "libraries:", "other_key: value"] {
            let result = analyze_manifest(yaml,).expect("empty manifest is not an error",);
            assert_eq!(result, InstrumentationSummary::default(), "input {yaml:?}");
        }
    }

    #[test]
    fn malformed_yaml_is_a_parse_error()
    {
        let error = analyze_manifest("libraries: [unclosed",).unwrap_err();
        assert!(matches!(error, Error::Parse { .. }));
    }

    #[test]
    fn unexpected_shapes_are_rejected()
    {
        for yaml in ["42", "just text", "libraries: 5", "internal: {a: b}", "- plain-string", "libraries:\n  web: nope"]
        {
            let error = analyze_manifest(yaml,).unwrap_err();
            assert!(matches!(error, Error::ManifestShape { .. }), "input {yaml:?} gave {error:?}");
        }
    }

    #[test]
    fn non_string_keys_are_ignored()
    {
        let entries = parse_manifest("- {0: hello, 2: [x]}\n- {description: kept, 7: true}",)
            .expect("valid manifest",);
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0], InstrumentationEntry::default());
        assert!(entries[1].has_description);
    }

    #[test]
    fn tagged_entries_are_unwrapped()
    {
        let yaml = "libraries: !list [!entry {description: tagged, target_versions: [library]}]";
        let result = analyze_manifest(yaml,).expect("valid manifest",);
        assert_eq!(result, summary(1, 1, 0, 1, 0));
    }

    #[test]
    fn missing_target_versions_only_counts_toward_total()
    {
        let entries = parse_manifest("- description: lonely",).expect("valid manifest",);
        assert_eq!(entries.len(), 1);
        assert!(entries[0].target_versions.is_empty());

        let result = InstrumentationSummary::from_entries(&entries,);
        assert_eq!(result, summary(1, 1, 0, 0, 0));
    }

    #[test]
    fn blank_description_and_empty_telemetry_are_absent()
    {
        let entries = parse_manifest("- {description: '   ', telemetry: {}}\n- {telemetry: null}",)
            .expect("valid manifest",);
        assert!(entries.iter().all(|entry| !entry.has_description && !entry.has_telemetry_config));
    }

    #[test]
    fn summary_observations_use_contract_names()
    {
        let observations = summary(4, 3, 2, 1, 0,).observations();
        let pairs: Vec<(&str, MetricValue,),> =
            observations.iter().map(|obs| (obs.name.as_str(), obs.value,),).collect();
        assert_eq!(pairs, vec![
            ("instrumentation.libraries.total", MetricValue::Count(4)),
            ("instrumentation.libraries.with_description", MetricValue::Count(3)),
            ("instrumentation.libraries.with_javaagent", MetricValue::Count(2)),
            ("instrumentation.libraries.with_library", MetricValue::Count(1)),
            ("instrumentation.libraries.with_telemetry_config", MetricValue::Count(0)),
        ]);
        assert!(observations.iter().all(|obs| obs.attributes.is_empty()));
    }

    fn entry_value(description: bool, targets: Option<Vec<&'static str,>,>, telemetry: bool,)
    -> Value
    {
        let mut mapping = Mapping::new();
        mapping.insert("name".into(), "lib".into(),);
        if description {
            mapping.insert("description".into(), "described".into(),);
        }
        if let Some(targets,) = targets {
            let list = targets.into_iter().map(Value::from,).collect::<Vec<_,>>();
            mapping.insert("target_versions".into(), Value::Sequence(list,),);
        }
        if telemetry {
            mapping.insert("telemetry".into(), Value::Sequence(vec!["when: default".into()],),);
        }
        Value::Mapping(mapping,)
    }

    fn target_strategy() -> impl Strategy<Value = Option<Vec<&'static str,>,>,>
    {
        proptest::option::of(proptest::collection::vec(
            prop_oneof![Just(TARGET_JAVAAGENT), Just(TARGET_LIBRARY), Just("other")],
            0..3,
        ),)
    }

    proptest! {
        #[test]
        fn counts_match_predicates(
            specs in proptest::collection::vec((any::<bool>(), target_strategy(), any::<bool>()), 0..40)
        ) {
            let document = Value::Sequence(
                specs.iter().cloned().map(|(d, t, tel)| entry_value(d, t, tel)).collect(),
            );
            let yaml = serde_yaml::to_string(&document).expect("serializable document");

            let result = analyze_manifest(&yaml).expect("generated manifest is valid");
            let described = specs.iter().filter(|(d, _, _)| *d).count() as u64;
            let javaagent = specs
                .iter()
                .filter(|(_, t, _)| t.as_ref().is_some_and(|t| t.contains(&TARGET_JAVAAGENT)))
                .count() as u64;

            prop_assert_eq!(result.total_count, specs.len() as u64);
            prop_assert_eq!(result.with_description_count, described);
            prop_assert_eq!(result.with_javaagent_count, javaagent);
            prop_assert!(result.with_description_count <= result.total_count);
            prop_assert!(result.with_javaagent_count <= result.total_count);
            prop_assert!(result.with_library_count <= result.total_count);
            prop_assert!(result.with_telemetry_count <= result.total_count);

            prop_assert_eq!(analyze_manifest(&yaml).expect("second pass"), result);
        }

        #[test]
        fn entries_without_targets_never_count_as_targeted(count in 0usize..20) {
            let document = Value::Sequence((0..count).map(|_| entry_value(true, None, false)).collect());
            let yaml = serde_yaml::to_string(&document).expect("serializable document");

            let result = analyze_manifest(&yaml).expect("generated manifest is valid");
            prop_assert_eq!(result.total_count, count as u64);
            prop_assert_eq!(result.with_javaagent_count, 0);
            prop_assert_eq!(result.with_library_count, 0);
        }
    }
}
