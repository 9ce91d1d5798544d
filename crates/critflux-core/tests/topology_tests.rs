//! Graph invariants across every topology and a range of sizes.

use critflux_core::prelude::*;

fn assert_well_formed(mesh: &Mesh, label: &str) {
    mesh.validate()
        .unwrap_or_else(|e| panic!("{label}: invalid graph: {e}"));
    assert!(mesh.is_connected(), "{label}: graph is disconnected");
    for i in 0..mesh.len() {
        for &j in mesh.neighbors(i) {
            assert!(
                mesh.neighbors(j).contains(&i),
                "{label}: edge {i}->{j} has no reverse"
            );
        }
    }
    assert_eq!(mesh.lats.len(), mesh.len());
    assert_eq!(mesh.lons.len(), mesh.len());
}

#[test]
fn every_kind_is_symmetric_and_connected_across_resolutions() {
    for kind in TopologyKind::ALL {
        for resolution in 0..3 {
            let topology = Topology::from_resolution(kind, resolution);
            let mesh = topology
                .build()
                .unwrap_or_else(|e| panic!("{kind} r={resolution}: {e}"));
            assert_well_formed(&mesh, &format!("{kind} r={resolution}"));
        }
    }
}

#[test]
fn lattice_wrap_modes_are_well_formed() {
    for wrap in [Wrap::Both, Wrap::Horizontal, Wrap::None] {
        let mesh = Topology::Lattice {
            height: 9,
            width: 11,
            wrap,
        }
        .build()
        .unwrap();
        assert_well_formed(&mesh, &format!("lattice {wrap:?}"));
        assert_eq!(mesh.grid.map(|g| g.wrap), Some(wrap));
    }
}

#[test]
fn icosphere_counts_follow_formula() {
    for s in 0..5 {
        let mesh = Topology::Icosphere { subdivisions: s }.build().unwrap();
        assert_eq!(mesh.len(), 10 * 4usize.pow(s as u32) + 2);
        let hex = Topology::HexSphere { subdivisions: s }.build().unwrap();
        assert_eq!(hex.len(), 20 * 4usize.pow(s as u32));
        assert_eq!(hex.degree_stats().max, 3);
    }
}

#[test]
fn neighbor_order_is_stable_across_builds() {
    let a = Topology::Fibonacci { count: 900 }.build().unwrap();
    let b = Topology::Fibonacci { count: 900 }.build().unwrap();
    assert_eq!(a.neighbors, b.neighbors);
}

#[test]
fn invalid_requests_fail_fast() {
    let bad = [
        Topology::Icosphere { subdivisions: 99 },
        Topology::Fibonacci { count: 0 },
        Topology::Lattice {
            height: 2,
            width: 2,
            wrap: Wrap::Both,
        },
        Topology::LatLonGrid {
            height: 1,
            width: 8,
        },
        Topology::Torus {
            segments_u: 8,
            segments_v: 8,
            major_radius: -1.0,
            minor_radius: 0.5,
        },
    ];
    for topology in bad {
        assert!(
            matches!(topology.build(), Err(CritfluxError::Topology(_))),
            "{topology:?} should be rejected"
        );
    }
}

#[test]
fn topology_round_trips_through_json() {
    let topology = Topology::Torus {
        segments_u: 24,
        segments_v: 16,
        major_radius: 1.1,
        minor_radius: 0.45,
    };
    let json = serde_json::to_string(&topology).unwrap();
    assert!(json.contains("\"kind\":\"torus\""));
    let back: Topology = serde_json::from_str(&json).unwrap();
    assert_eq!(back, topology);
}

#[test]
fn fibonacci_spirals_connect_across_the_accepted_range() {
    let mut counts: Vec<usize> = (1..=80).collect();
    counts.extend((600..=5000).step_by(97));
    counts.extend([11_712, 20_000, 100_000, 200_000]);
    for count in counts {
        let mesh = Topology::Fibonacci { count }
            .build()
            .unwrap_or_else(|e| panic!("fibonacci {count}: {e}"));
        assert_well_formed(&mesh, &format!("fibonacci {count}"));
        assert!(mesh.degree_stats().min >= 1, "fibonacci {count}: isolated node");
    }
}
