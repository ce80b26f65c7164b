use std::fs;
use std::path::PathBuf;

use chrono::NaiveDate;
use gbmdx_core::Transpiler;
use gbmdx_docusaurus::{
    MetadataSynthesizer, MetadataValue, SiteConfig, SynthesisOutcome, process_files,
};

fn synthesizer() -> MetadataSynthesizer {
    MetadataSynthesizer::new(SiteConfig {
        today: NaiveDate::from_ymd_opt(2024, 5, 1),
        ..SiteConfig::default()
    })
}

#[test]
fn getting_started_page() {
    let page = "# Getting started\n\nThis guide walks through your first ObjectBox entity.\n";
    let synthesis = synthesizer()
        .synthesize(PathBuf::from("getting-started.md").as_path(), page)
        .unwrap();

    assert_eq!(
        synthesis.text,
        "---\n\
title: \"Getting Started with ObjectBox C++\"\n\
description: \"Step-by-step tutorial to integrate ObjectBox database in your C++ application and create your first entities\"\n\
keywords:\n  - objectbox\n  - c++\n  - cpp\n  - cmake\n  - database\n  - tutorial\n\
---\n\n\
import { TechnicalArticleSchema } from '@site/src/components/Schema';\n\n\
<TechnicalArticleSchema\n  \
headline=\"Getting Started with ObjectBox C++\"\n  \
description=\"Step-by-step tutorial to integrate ObjectBox database in your C++ application and create your first entities\"\n  \
url=\"https://cpp.objectbox.io/getting-started\"\n  \
datePublished=\"2024-05-01\"\n  \
dateModified=\"2024-05-01\"\n\
/>\n\n\
# Getting started\n\nThis guide walks through your first ObjectBox entity.\n"
    );
}

#[test]
fn existing_values_and_extra_keys_survive() {
    let page = "---\ntitle: My own title\nsidebar_position: 3\nslug: /custom\n---\n\n# Heading\n\nA paragraph that is long enough to describe things.\n";
    let synthesis = synthesizer()
        .synthesize(PathBuf::from("misc.md").as_path(), page)
        .unwrap();

    assert_eq!(synthesis.record.title, MetadataValue::Present("My own title".into()));
    assert_eq!(
        synthesis.record.description,
        MetadataValue::Synthesized("A paragraph that is long enough to describe things.".into())
    );
    assert!(synthesis.text.starts_with("---\ntitle: \"My own title\"\n"));
    assert!(synthesis.text.contains("  - database\n  - misc\nsidebar_position: 3\nslug: /custom\n---\n\n"));
}

#[test]
fn bare_description_header_is_completed() {
    let page = "description: Moving data between versions\n# Schema changes\n\nText\n";
    let synthesis = synthesizer()
        .synthesize(PathBuf::from("schema-changes.md").as_path(), page)
        .unwrap();

    assert_eq!(synthesis.outcome, SynthesisOutcome::Updated);
    assert_eq!(
        synthesis.record.description,
        MetadataValue::Present("Moving data between versions".into())
    );
    assert!(synthesis.text.starts_with(
        "---\ntitle: \"Schema Changes in ObjectBox C++\"\ndescription: \"Moving data between versions\"\n"
    ));
    assert!(synthesis.text.ends_with("/>\n\n# Schema changes\n\nText\n"));
}

#[test]
fn readme_gets_the_documentation_schema() {
    let synthesis = synthesizer()
        .synthesize(PathBuf::from("README.md").as_path(), "# ObjectBox C++\n")
        .unwrap();
    assert!(synthesis.text.contains("title: \"ObjectBox C++ Database Documentation\"\n"));
    assert!(synthesis.text.contains(
        "import { SoftwareDocumentationSchema } from '@site/src/components/Schema';\n\n<SoftwareDocumentationSchema\n"
    ));
    assert!(synthesis.text.contains("  dateModified=\"2024-05-01\"\n/>"));
}

#[test]
fn processes_a_directory_and_skips_finished_pages() {
    let dir = tempfile::tempdir().unwrap();
    let queries = dir.path().join("queries.md");
    let faq = dir.path().join("faq.md");
    fs::write(&queries, "# Queries\n\nBuild queries with conditions.\n").unwrap();
    fs::write(&faq, "# FAQ\n").unwrap();
    let paths = vec![queries.clone(), faq.clone(), dir.path().join("missing.md")];

    let synthesizer = synthesizer();
    let first = process_files(&paths, &synthesizer, true);
    assert_eq!((first.updated, first.unchanged, first.failed), (2, 0, 1));
    assert!(first.files[2].result.is_err());

    let faq_text = fs::read_to_string(&faq).unwrap();
    assert!(faq_text.contains("import { FAQSchema, TechnicalArticleSchema } from"));

    let second = process_files(&paths[..2], &synthesizer, false);
    assert_eq!((second.updated, second.unchanged, second.failed), (0, 2, 0));
    assert_eq!(fs::read_to_string(&faq).unwrap(), faq_text);
}

#[test]
fn site_config_changes_the_output() {
    let config = SiteConfig::from_yaml_str(
        "project_name: Acme\nlanguage: Go\nbase_url: https://go.acme.dev/\ntoday: 2023-01-02\n",
    )
    .unwrap();
    let synthesis = MetadataSynthesizer::new(config)
        .synthesize(PathBuf::from("transactions.md").as_path(), "Body text\n")
        .unwrap();
    assert!(synthesis.text.contains("title: \"Transactions in Acme Go\"\n"));
    assert!(synthesis.text.contains("keywords:\n  - acme\n  - go\n  - golang\n  - database\n  - transactions\n  - atomic operations\n"));
    assert!(synthesis.text.contains("  url=\"https://go.acme.dev/transactions\"\n"));
    assert!(synthesis.text.contains("  datePublished=\"2023-01-02\"\n"));
}

#[test]
fn converted_and_synthesized_page_is_a_fixed_point() {
    let source = "# Install\n\n{% tabs %}\n{% tab title=\"C++\" %}\n```\nobx::Store store;\n```\n{% endtab %}\n{% tab title=\"CMake\" %}\n```\nfind_package(ObjectBox)\n```\n{% endtab %}\n{% endtabs %}\n\nUse {braces} carefully.\n";
    let transpiler = Transpiler::default();
    let converted = transpiler.transpile("install.md", source).text;
    assert!(converted.starts_with("import Tabs from '@theme/Tabs';\nimport TabItem from '@theme/TabItem';\n\n"));

    let synthesized = synthesizer()
        .synthesize(PathBuf::from("install.mdx").as_path(), &converted)
        .unwrap()
        .text;
    assert!(synthesized.contains(
        "import TabItem from '@theme/TabItem';\n\nimport { TechnicalArticleSchema } from '@site/src/components/Schema';\n"
    ));

    let again = transpiler.transpile("install.mdx", &synthesized).text;
    assert_eq!(again, synthesized);

    let settled = synthesizer()
        .synthesize(PathBuf::from("install.mdx").as_path(), &again)
        .unwrap();
    assert_eq!(settled.outcome, SynthesisOutcome::Unchanged);
}
