// Copyright (c) 2025 Erick Bourgeois, firestoned
// SPDX-License-Identifier: MIT

//! CRD YAML Generator
//!
//! Generates the `Gslb` CRD YAML from the Rust types in src/crd.rs, so the
//! manifest in deploy/crds/ always matches the code.
//!
//! Usage:
//!   cargo run --bin crdgen

use gslb::crd::Gslb;
use kube::CustomResourceExt;
use serde_json::Value;
use std::fs;
use std::path::Path;

const COPYRIGHT_HEADER: &str = "# Copyright (c) 2025 Erick Bourgeois, firestoned
# SPDX-License-Identifier: MIT
#
# This file is AUTO-GENERATED from src/crd.rs
# DO NOT EDIT MANUALLY - Run `cargo run --bin crdgen` to regenerate
#
";

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let output_dir = Path::new("deploy/crds");

    fs::create_dir_all(output_dir)?;

    println!("Generating CRD YAML files from src/crd.rs...");

    generate_crd::<Gslb>("gslbs.crd.yaml", output_dir)?;

    println!("✓ Successfully generated CRD YAML files in deploy/crds/");
    println!("\nNext steps:");
    println!("  1. Review the generated files");
    println!("  2. Deploy with: kubectl apply -f deploy/crds/");

    Ok(())
}

fn generate_crd<T>(filename: &str, output_dir: &Path) -> Result<(), Box<dyn std::error::Error>>
where
    T: CustomResourceExt,
{
    let mut crd_json: Value = serde_json::to_value(T::crd())?;

    // Single served version, which is also the storage version
    if let Some(versions) = crd_json["spec"]["versions"].as_array_mut() {
        for version in versions {
            version["served"] = Value::Bool(true);
            version["storage"] = Value::Bool(true);
        }
    }

    let yaml = serde_yaml::to_string(&crd_json)?;
    let content = format!("{COPYRIGHT_HEADER}{yaml}");

    let output_path = output_dir.join(filename);
    fs::write(&output_path, content)?;

    println!("  ✓ Generated {filename}");

    Ok(())
}
