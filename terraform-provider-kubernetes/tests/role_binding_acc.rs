//! Acceptance tests against a live cluster; run with `TF_ACC=1`.

use provider_common::acctest::{self, check_resource_attr, rand_string, TestCase, TestStep};
use serde_json::json;
use terraform_provider_kubernetes::KubernetesProvider;

const ADDRESS: &str = "kubernetes_role_binding.test";

fn pre_check() {
    let has_config = ["KUBE_CONFIG", "KUBECONFIG", "KUBE_HOST", "HOME"]
        .iter()
        .any(|k| std::env::var_os(k).is_some());
    assert!(has_config, "a kubeconfig or KUBE_HOST must be available for acceptance tests");
}

fn config(role_name: &str, name: &str, subjects: serde_json::Value) -> String {
    json!({
        "resource": {
            "kubernetes_role": {
                "test": {
                    "metadata": {"name": role_name},
                    "rule": {
                        "api_groups": [""],
                        "resources": ["pods", "pods/log"],
                        "verbs": ["get", "list"]
                    }
                }
            },
            "kubernetes_role_binding": {
                "test": {
                    "metadata": {"name": name},
                    "role_ref": {"name": role_name, "kind": "Role"},
                    "subject": subjects
                }
            }
        }
    })
    .to_string()
}

#[test]
fn test_acc_kubernetes_role_binding_basic() {
    let name = format!("tf-acc-test-{}", rand_string(10));
    let role_name = format!("tf-acc-role-{}", rand_string(10));

    let case = TestCase::new(json!({}))
        .pre_check(pre_check)
        .id_refresh_name(ADDRESS)
        .step(
            TestStep::config(config(&role_name, &name, json!([{"kind": "Group", "name": "monitoring"}])))
                .check(check_resource_attr(ADDRESS, "role_ref.#", "1"))
                .check(check_resource_attr(ADDRESS, "role_ref.0.kind", "Role"))
                .check(check_resource_attr(ADDRESS, "role_ref.0.name", &role_name))
                .check(check_resource_attr(ADDRESS, "subject.#", "1"))
                .check(check_resource_attr(ADDRESS, "subject.0.kind", "Group")),
        )
        .step(
            TestStep::config(config(
                &role_name,
                &name,
                json!([
                    {"kind": "Group", "name": "monitoring"},
                    {"kind": "User", "name": "gary"}
                ]),
            ))
            .check(check_resource_attr(ADDRESS, "subject.#", "2"))
            .check(check_resource_attr(ADDRESS, "subject.0.kind", "Group"))
            .check(check_resource_attr(ADDRESS, "subject.1.kind", "User")),
        );

    acctest::test(KubernetesProvider, case);
}

#[test]
fn test_acc_kubernetes_role_binding_import_basic() {
    let name = format!("tf-acc-test-{}", rand_string(10));
    let role_name = format!("tf-acc-role-{}", rand_string(10));

    let case = TestCase::new(json!({}))
        .pre_check(pre_check)
        .step(TestStep::config(config(
            &role_name,
            &name,
            json!([{"kind": "Group", "name": "monitoring"}]),
        )))
        .step(TestStep::import(ADDRESS).verify(&["metadata.0.resource_version"]));

    acctest::test(KubernetesProvider, case);
}
