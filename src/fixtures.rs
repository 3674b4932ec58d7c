//! Domain fixtures shared by tests: space objects and family records, built
//! both through the builder API and from the JSON documents under `fixtures/`.
use indexmap::IndexMap;

use crate::compiler::Compiler;
use crate::contains;
use crate::descriptor::{Correction, Descriptor, Predicate};
use crate::harness::RunConfig;
use crate::lower;
use crate::value::Value;

pub const SPACE_JSON: &str = include_str!("../fixtures/space.json");
pub const FAMILY_JSON: &str = include_str!("../fixtures/family.json");

pub fn document(src: &str) -> IndexMap<String, Descriptor> {
    let module = lower::load_module(src, None).unwrap();
    lower::lower_module(&module).unwrap()
}

pub fn compiler() -> Compiler {
    let mut compiler = Compiler::new();
    contains::register(&mut compiler);
    compiler
}

pub fn assert_generates(compiler: &Compiler, name: &str, ty: &Descriptor, config: &RunConfig) {
    if let Err(err) = compiler.check(ty, config) {
        panic!("{name}: {err}");
    }
}

// ---- space objects ---- //

pub struct Space {
    pub vector: Descriptor,
    pub asteroid: Descriptor,
    pub planet: Descriptor,
    pub rank: Descriptor,
    pub crew_member: Descriptor,
    pub ship: Descriptor,
    pub space_object: Descriptor,
}

pub fn space() -> Space {
    let vector = Descriptor::tuple([Descriptor::number(), Descriptor::number(), Descriptor::number()]);
    let asteroid = Descriptor::record([
        ("type", Descriptor::literal("asteroid")),
        ("location", vector.clone()),
        ("mass", Descriptor::number()),
    ]);
    let planet = Descriptor::record([
        ("type", Descriptor::literal("planet")),
        ("location", vector.clone()),
        ("mass", Descriptor::number()),
        ("population", Descriptor::number()),
        ("habitable", Descriptor::boolean()),
    ]);
    let rank = Descriptor::union(literals(&["captain", "first mate", "officer", "ensign"]));
    let crew_member = Descriptor::record([
        ("name", Descriptor::string()),
        ("age", Descriptor::number()),
        ("rank", rank.clone()),
        ("home", planet.clone()),
    ]);
    let ship = Descriptor::record([
        ("type", Descriptor::literal("ship")),
        ("location", vector.clone()),
        ("mass", Descriptor::number()),
        ("name", Descriptor::string()),
        ("crew", Descriptor::array(crew_member.clone())),
    ]);
    let space_object = Descriptor::union([asteroid.clone(), planet.clone(), ship.clone()]);
    Space { vector, asteroid, planet, rank, crew_member, ship, space_object }
}

// ---- family objects ---- //

fn string_or_void() -> Descriptor {
    Descriptor::string().or(&Descriptor::void())
}

pub fn fio() -> Descriptor {
    Descriptor::partial([
        ("firstname", string_or_void()),
        ("lastname", string_or_void()),
        ("middlename", string_or_void()),
    ])
}

pub fn member_with_role(role: Descriptor) -> Descriptor {
    Descriptor::record([("role", role), ("fio", fio())])
        .and(&Descriptor::partial([("dependant", Descriptor::boolean().or(&Descriptor::void()))]))
}

fn literals(names: &[&str]) -> Vec<Descriptor> {
    names.iter().map(|n| Descriptor::literal(*n)).collect()
}

pub fn spouse() -> Descriptor {
    member_with_role(Descriptor::literal("spouse"))
}

pub fn not_spouse() -> Descriptor {
    let mut roles = literals(&["sibling", "child", "parent"]);
    roles.push(Descriptor::void());
    member_with_role(Descriptor::union(roles))
}

fn spouse_count(family: &Value) -> usize {
    family
        .member("members")
        .as_array()
        .map_or(0, |xs| xs.iter().filter(|m| m.member("role") == &Value::from("spouse")).count())
}

fn espoused(family: &Value) -> bool {
    family.member("type") == &Value::from("espoused")
}

/// Families whose spouse count agrees with their type, repaired into shape
/// rather than filtered.
pub fn consistent_family() -> Descriptor {
    let mut types = literals(&["espoused", "single", "common_law_marriage"]);
    types.push(Descriptor::void());
    let mut roles = literals(&["sibling", "child", "parent", "spouse"]);
    roles.push(Descriptor::void());
    let family = Descriptor::record([
        ("type", Descriptor::union(types)),
        ("members", Descriptor::array(member_with_role(Descriptor::union(roles)))),
    ]);

    let consistent = Predicate::new("spouse count matches type", |v| {
        spouse_count(v) == usize::from(espoused(v))
    });
    let repair = Correction::new("keep at most the first spouse", |mut v| {
        let wants = usize::from(espoused(&v));
        if let Value::Object(fields) = &mut v {
            if let Some(Value::Array(members)) = fields.get_mut("members") {
                let is_spouse = |m: &Value| m.member("role") == &Value::from("spouse");
                let mut kept = 0;
                members.retain(|m| {
                    if !is_spouse(m) {
                        return true;
                    }
                    kept += 1;
                    kept <= wants
                });
                if kept < wants {
                    let fresh = [("role", Value::from("spouse")), ("fio", Value::Object(IndexMap::new()))];
                    members.insert(0, Value::Object(fresh.into_iter().map(|(k, v)| (k.to_string(), v)).collect()));
                }
            }
        }
        v
    });
    family.with_correction(consistent, repair)
}

pub fn family_with(ty: Descriptor, spouses: usize) -> Descriptor {
    let member = spouse().or(&not_spouse());
    Descriptor::record([
        ("type", ty),
        ("members", contains::array_with_contains(&Descriptor::array(member), &spouse(), spouses)),
    ])
}

pub fn family_object() -> Descriptor {
    let mut unmarried = literals(&["single", "common_law_marriage"]);
    unmarried.push(Descriptor::void());
    family_with(Descriptor::literal("espoused"), 1).or(&family_with(Descriptor::union(unmarried), 0))
}

// ------------------------------- Tests ------------------------------------ //

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::Shape;

    #[test]
    fn space_objects_generate() {
        let s = space();
        let compiler = compiler();
        let config = RunConfig::seeded(2024).with_cases(200);
        for (name, ty) in [
            ("Vector", &s.vector),
            ("Asteroid", &s.asteroid),
            ("Planet", &s.planet),
            ("Rank", &s.rank),
            ("CrewMember", &s.crew_member),
            ("Ship", &s.ship),
            ("SpaceObject", &s.space_object),
        ] {
            assert_generates(&compiler, name, ty, &config);
        }
    }

    #[test]
    fn family_objects_generate() {
        let compiler = compiler();
        let config = RunConfig::seeded(7).with_cases(300);
        assert_generates(&compiler, "Fio", &fio(), &config);
        assert_generates(&compiler, "Member", &spouse().or(&not_spouse()), &config);
        assert_generates(&compiler, "ConsistentFamily", &consistent_family(), &config);
        assert_generates(&compiler, "FamilyObject", &family_object(), &config);
    }

    #[test]
    fn spouse_counts_hold() {
        let compiler = compiler();
        let config = RunConfig::seeded(8).with_cases(300);
        let unmarried = Descriptor::union(literals(&["single", "common_law_marriage"]));
        assert_generates(&compiler, "FamilyWithSpouse", &family_with(Descriptor::literal("espoused"), 1), &config);
        assert_generates(&compiler, "FamilyWithoutSpouse", &family_with(unmarried, 0), &config);
    }

    #[test]
    fn correction_repairs_inconsistent_families() {
        let family = consistent_family();
        let crowded: Value = serde_json::json!({
            "type": "espoused",
            "members": [{"role": "spouse", "fio": {}}, {"role": "child", "fio": {}}, {"role": "spouse", "fio": {}}]
        })
        .into();
        let Shape::Constraint(c) = family.shape() else { panic!("constraint expected") };
        let fixed = c.correction.as_ref().unwrap().apply(crowded);
        assert_eq!(spouse_count(&fixed), 1);
        assert!(family.guard(&fixed));
    }

    #[test]
    fn space_document_generates() {
        let compiler = compiler();
        let config = RunConfig::seeded(11).with_cases(100);
        for (name, ty) in &document(SPACE_JSON) {
            assert_generates(&compiler, name, ty, &config);
        }
    }

    #[test]
    fn family_document_generates() {
        let compiler = compiler();
        let config = RunConfig::seeded(12).with_cases(100);
        for (name, ty) in &document(FAMILY_JSON) {
            assert_generates(&compiler, name, ty, &config);
        }
    }
}
