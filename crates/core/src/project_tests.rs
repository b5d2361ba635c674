// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

use super::*;
use proptest::prelude::*;

#[yare::parameterized(
    bare_https   = { "https://example.com/ops.git",            "https://example.com/ops.git",       "master" },
    with_branch  = { "https://example.com/ops.git#develop",    "https://example.com/ops.git",       "develop" },
    with_tag     = { "git@example.com:ops/site.git#v1.2.0",    "git@example.com:ops/site.git",      "v1.2.0" },
    extra_hashes = { "ssh://host/repo.git#main#ignored",       "ssh://host/repo.git",               "main" },
    empty_ref    = { "ssh://host/repo.git#",                   "ssh://host/repo.git",               "" },
)]
fn git_source_parse(raw: &str, url: &str, reference: &str) {
    let source = GitSource::parse(raw);
    assert_eq!(source.url, url);
    assert_eq!(source.reference, reference);
}

proptest! {
    #[test]
    fn git_source_round_trips(url in "[a-z]{1,8}://[a-z./]{1,20}", reference in "[a-zA-Z0-9._/-]{1,16}") {
        let parsed = GitSource::parse(&format!("{url}#{reference}"));
        prop_assert_eq!(parsed, GitSource { url: url.clone(), reference });

        let bare = GitSource::parse(&url);
        prop_assert_eq!(bare.reference, DEFAULT_GIT_REF);
        prop_assert_eq!(bare.url, url);
    }
}

#[test]
fn file_inventory_uses_stored_path() {
    let inventory = Inventory {
        id: 1,
        project_id: 1,
        name: "prod".to_string(),
        kind: InventoryKind::File,
        inventory: "/etc/ansible/hosts".to_string(),
        ssh_key_id: None,
        become_key_id: None,
    };
    assert_eq!(
        inventory.path_for_task(Path::new("/tmp/ty"), 42),
        PathBuf::from("/etc/ansible/hosts")
    );
}

#[test]
fn static_inventory_materialises_under_tmp() {
    let inventory = Inventory {
        id: 1,
        project_id: 1,
        name: "prod".to_string(),
        kind: InventoryKind::Static,
        inventory: "[web]\nhost1\n".to_string(),
        ssh_key_id: None,
        become_key_id: None,
    };
    assert_eq!(
        inventory.path_for_task(Path::new("/tmp/ty"), 42),
        PathBuf::from("/tmp/ty/inventory_42")
    );
}

#[test]
fn unknown_inventory_type_is_static() {
    let inventory: Inventory = serde_json::from_str(
        r#"{"id":1,"project_id":1,"name":"x","type":"dynamic","inventory":"h1"}"#,
    )
    .unwrap();
    assert_eq!(inventory.kind, InventoryKind::Static);
}

#[test]
fn template_builder_defaults() {
    let template = Template::builder().alias("nightly").override_arguments(true).build();
    assert_eq!(template.alias, "nightly");
    assert_eq!(template.playbook, "site.yml");
    assert!(template.override_arguments);
    assert_eq!(template.vault_key_id, None);
}
