//! Marklund-form allometric functions, `ln B = a + b·d/(d + c)` per tree
//! component, with `d` the diameter in cm and `B` the dry mass in kg.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::{Display, Formatter};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum BiomassComponent {
    StemWood,
    StemBark,
    LivingBranches,
    DeadBranches,
    Foliage,
}

impl BiomassComponent {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StemWood => "stem_wood",
            Self::StemBark => "stem_bark",
            Self::LivingBranches => "living_branches",
            Self::DeadBranches => "dead_branches",
            Self::Foliage => "foliage",
        }
    }
}

impl Display for BiomassComponent {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str((*self).as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Deserialize, Serialize)]
pub struct ComponentCoefficients {
    pub component: BiomassComponent,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl ComponentCoefficients {
    const fn new(component: BiomassComponent, a: f64, b: f64, c: f64) -> Self {
        Self { component, a, b, c }
    }

    pub fn biomass_kg(&self, diameter_cm: f64) -> f64 {
        (self.a + self.b * diameter_cm / (diameter_cm + self.c)).exp()
    }
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SpeciesAllometry {
    pub species: String,
    pub components: Vec<ComponentCoefficients>,
}

impl SpeciesAllometry {
    /// Sum over all components; `None` for a non-positive or non-finite
    /// diameter.
    pub fn biomass_kg(&self, diameter_cm: f64) -> Option<f64> {
        if !(diameter_cm.is_finite() && diameter_cm > 0.0) {
            return None;
        }
        let total: f64 = self
            .components
            .iter()
            .map(|component| component.biomass_kg(diameter_cm))
            .sum();
        total.is_finite().then_some(total)
    }
}

use BiomassComponent::{DeadBranches, Foliage, LivingBranches, StemBark, StemWood};

const SCOTS_PINE: [ComponentCoefficients; 5] = [
    ComponentCoefficients::new(StemWood, -2.2184, 11.4219, 14.0),
    ComponentCoefficients::new(StemBark, -2.9748, 8.8489, 16.0),
    ComponentCoefficients::new(LivingBranches, -4.0813, 13.3955, 10.0),
    ComponentCoefficients::new(DeadBranches, -5.8926, 7.1270, 10.0),
    ComponentCoefficients::new(Foliage, -3.7983, 7.7681, 7.0),
];

const NORWAY_SPRUCE: [ComponentCoefficients; 5] = [
    ComponentCoefficients::new(StemWood, -2.2471, 11.4873, 14.0),
    ComponentCoefficients::new(StemBark, -3.3912, 9.8364, 15.0),
    ComponentCoefficients::new(LivingBranches, -4.1875, 13.0241, 8.0),
    ComponentCoefficients::new(DeadBranches, -4.6351, 3.6518, 18.0),
    ComponentCoefficients::new(Foliage, -1.9602, 7.8171, 12.0),
];

const BIRCH: [ComponentCoefficients; 5] = [
    ComponentCoefficients::new(StemWood, -3.3045, 10.8109, 11.0),
    ComponentCoefficients::new(StemBark, -4.3308, 10.3876, 14.0),
    ComponentCoefficients::new(LivingBranches, -3.3633, 10.2806, 10.0),
    ComponentCoefficients::new(DeadBranches, -6.6237, 11.2872, 30.0),
    ComponentCoefficients::new(Foliage, -3.9823, 8.0580, 8.0),
];

/// Species code to allometry lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct AllometryTable {
    species: BTreeMap<String, SpeciesAllometry>,
}

impl Default for AllometryTable {
    fn default() -> Self {
        Self::builtin()
    }
}

impl AllometryTable {
    /// Scots pine (`PS`), Norway spruce (`PA`) and birch (`BP`).
    pub fn builtin() -> Self {
        let species = [("PS", SCOTS_PINE), ("PA", NORWAY_SPRUCE), ("BP", BIRCH)]
            .into_iter()
            .map(|(code, components)| {
                (
                    code.to_string(),
                    SpeciesAllometry {
                        species: code.to_string(),
                        components: components.to_vec(),
                    },
                )
            })
            .collect();
        Self { species }
    }

    /// Adds or replaces entries. Species codes are matched case-insensitively.
    pub fn with_entries(mut self, entries: impl IntoIterator<Item = SpeciesAllometry>) -> Self {
        for mut entry in entries {
            entry.species = entry.species.trim().to_ascii_uppercase();
            self.species.insert(entry.species.clone(), entry);
        }
        self
    }

    pub fn get(&self, species: &str) -> Option<&SpeciesAllometry> {
        self.species.get(&species.trim().to_ascii_uppercase())
    }

    pub fn species_codes(&self) -> impl Iterator<Item = &str> {
        self.species.keys().map(String::as_str)
    }
}

#[cfg(test)]
mod tests {
    use super::{AllometryTable, BiomassComponent, ComponentCoefficients, SpeciesAllometry};

    #[test]
    fn builtin_table_covers_the_three_boreal_species() {
        let table = AllometryTable::builtin();
        let codes: Vec<&str> = table.species_codes().collect();
        assert_eq!(codes, vec!["BP", "PA", "PS"]);
        for code in codes {
            let allometry = table.get(code).expect("species should be present");
            assert_eq!(allometry.components.len(), 5);
        }
    }

    #[test]
    fn biomass_grows_with_diameter() {
        let pine = AllometryTable::builtin();
        let pine = pine.get("ps").expect("pine");
        let small = pine.biomass_kg(10.0).expect("biomass");
        let large = pine.biomass_kg(30.0).expect("biomass");
        assert!(small > 10.0 && small < 100.0, "10 cm pine {small} kg");
        assert!(large > small * 5.0);
        assert_eq!(pine.biomass_kg(0.0), None);
        assert_eq!(pine.biomass_kg(f64::NAN), None);
    }

    #[test]
    fn configured_entries_extend_the_table() {
        let larch = SpeciesAllometry {
            species: " lx ".to_string(),
            components: vec![ComponentCoefficients {
                component: BiomassComponent::StemWood,
                a: 0.0,
                b: 0.0,
                c: 1.0,
            }],
        };
        let table = AllometryTable::builtin().with_entries([larch]);
        let entry = table.get("LX").expect("larch should be registered");
        assert_eq!(entry.biomass_kg(12.0), Some(1.0));
        assert!(table.get("PS").is_some());
    }
}
