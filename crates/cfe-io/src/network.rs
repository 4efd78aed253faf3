//! Network document export/import
//!
//! Flattens the network into its component tables ([`NetworkParts`]) and
//! writes them as pretty-printed JSON. The document is self-describing:
//! every component carries its id, role tags, series, and solved results,
//! so a solved network re-imports with identical capacities and dispatch.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter};
use std::path::Path;

use anyhow::{Context, Result};
use cfe_core::{Network, NetworkParts};

pub fn export_network(network: &Network, path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("creating output directory '{}'", parent.display()))?;
    }
    let file = File::create(path)
        .with_context(|| format!("creating network document '{}'", path.display()))?;
    serde_json::to_writer_pretty(BufWriter::new(file), &network.to_parts())
        .context("serializing network document")?;
    Ok(())
}

pub fn import_network(path: &Path) -> Result<Network> {
    let file = File::open(path)
        .with_context(|| format!("opening network document '{}'", path.display()))?;
    let parts: NetworkParts = serde_json::from_reader(BufReader::new(file))
        .context("parsing network document")?;
    let network = Network::from_parts(parts)
        .with_context(|| format!("rebuilding network from '{}'", path.display()))?;
    Ok(network)
}

#[cfg(test)]
mod tests {
    use super::*;
    use cfe_core::{Carrier, Generator, Load, Profile, Snapshots, StorageUnit};
    use cfe_opt::{attach_consumer_systems, DispatchModel, SolverConfig, SubsystemSpec};

    fn solved_network() -> Network {
        let mut network = Network::new();
        network.set_snapshots(Snapshots::hourly(3));
        network.add_carrier(Carrier::new("solar", 0.0)).unwrap();
        network.add_carrier(Carrier::new("gas", 0.2)).unwrap();
        network.add_carrier(Carrier::new("battery", 0.0)).unwrap();
        let bus = network.add_bus("DE0", 10.0, 50.0).unwrap();
        network
            .add_generator(
                Generator::new("DE0 solar", bus)
                    .with_technology("solar", "solar")
                    .with_nameplate(20.0, false)
                    .with_profile(Profile::Series(vec![1.0, 0.5, 0.0])),
            )
            .unwrap();
        network
            .add_generator(
                Generator::new("DE0 gas", bus)
                    .with_technology("gas", "gas")
                    .with_nameplate(40.0, false)
                    .with_costs(35.0, 0.0),
            )
            .unwrap();
        network
            .add_storage_unit(
                StorageUnit::new("DE0 battery", bus)
                    .with_carrier("battery")
                    .with_nameplate(5.0, false)
                    .with_energy(4.0),
            )
            .unwrap();
        network
            .add_load(Load::new("DE0 load", bus, vec![12.0, 9.0, 6.0]))
            .unwrap();
        attach_consumer_systems(
            &mut network,
            &[bus],
            &SubsystemSpec {
                load_fraction: 0.25,
                palette: vec!["solar".into(), "battery".into()],
                extendable: true,
            },
        )
        .unwrap();

        let model = DispatchModel::new();
        model
            .solve(&mut network, &SolverConfig::default())
            .expect("toy network should solve");
        network
    }

    #[test]
    fn test_round_trip_preserves_capacities_and_dispatch() {
        let network = solved_network();
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("solved_networks").join("brownfield.json");

        export_network(&network, &path).unwrap();
        let restored = import_network(&path).unwrap();

        let before = network.to_parts();
        let after = restored.to_parts();

        assert_eq!(before.buses.len(), after.buses.len());
        assert_eq!(before.links.len(), after.links.len());
        assert_eq!(before.snapshots, after.snapshots);

        for (b, a) in before.generators.iter().zip(&after.generators) {
            assert_eq!(b.name, a.name);
            assert_eq!(b.role, a.role);
            // capacities exactly, dispatch within serialization precision
            assert_eq!(b.p_nom, a.p_nom);
            assert_eq!(b.p_nom_opt, a.p_nom_opt);
            assert_eq!(b.p.len(), a.p.len());
            for (x, y) in b.p.iter().zip(&a.p) {
                assert!((x - y).abs() < 1e-6);
            }
        }
        for (b, a) in before.links.iter().zip(&after.links) {
            assert_eq!(b.name, a.name);
            assert_eq!(b.p_nom_opt, a.p_nom_opt);
            for (x, y) in b.p0.iter().zip(&a.p0) {
                assert!((x - y).abs() < 1e-6);
            }
        }
        for (b, a) in before.storage_units.iter().zip(&after.storage_units) {
            assert_eq!(b.name, a.name);
            assert_eq!(b.p_nom_opt, a.p_nom_opt);
            for (x, y) in b.state_of_charge.iter().zip(&a.state_of_charge) {
                assert!((x - y).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn test_import_missing_file_errors() {
        let dir = tempfile::tempdir().unwrap();
        let err = import_network(&dir.path().join("nope.json")).unwrap_err();
        assert!(err.to_string().contains("nope.json"));
    }
}
