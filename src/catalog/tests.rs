use std::sync::Arc;

use crate::catalog::{TAGS, registry};
use crate::{Attributes, Collector, Context, FootprintError, Options, Registry, Value, Why, desc};

fn catalog() -> Registry {
    registry().expect("catalog declarations are valid")
}

fn pick(registry: &Registry, tag: &str, d: &Attributes, ctx: &Context) -> Option<(String, Attributes)> {
    let collector: &Collector = registry.collector(tag).expect("catalog collector");
    collector
        .pick_best(d, ctx, &Options::default())
        .expect("structural error")
        .map(|s| (s.candidate.name().to_string(), s.resolution.attrs))
}

#[test]
fn catalog_collectors() {
    let registry = catalog();
    assert_eq!(registry.tags().collect::<Vec<_>>(), TAGS);

    let names = |tag: &str| -> Vec<String> {
        registry.collector(tag).unwrap().candidates().iter().map(|c| c.name().to_string()).collect()
    };
    assert_eq!(names("resource"), vec!["Analysis", "GridPointGrib", "GridPointFA", "Climatology"]);
    assert_eq!(names("provider"), vec!["Experiment", "OpSuite", "Remote"]);
    assert_eq!(names("store"), vec!["Finder", "Archive", "Cache", "MtoolCache"]);
}

#[test]
fn analysis_accepts_aliases_and_remaps() {
    let registry = catalog();
    let d = desc! { "kind" => "analyse", "date" => "2024010100", "cut" => "a" };
    let (name, attrs) = pick(&registry, "resource", &d, &Context::default()).unwrap();
    assert_eq!(name, "Analysis");
    assert_eq!(attrs["kind"], Value::from("analysis"));
    assert_eq!(attrs["cutoff"], Value::from("assim"));
    assert_eq!(attrs["model"], Value::from("arpege"));
    assert_eq!(attrs["date"].to_string(), "2024-01-01T00:00:00");
}

#[test]
fn gridpoint_format_follows_the_date() {
    let registry = catalog();
    let ctx = Context::default();

    let recent = desc! { "kind" => "gridpoint", "date" => "2024010100", "term" => 6, "cutoff" => "production" };
    let (name, attrs) = pick(&registry, "resource", &recent, &ctx).unwrap();
    assert_eq!(name, "GridPointGrib");
    assert_eq!(attrs["nativefmt"], Value::from("grib"));
    assert_eq!(attrs["basename"], Value::from("grid.arpege.global+0006"));

    let old = desc! { "kind" => "gridpoint", "date" => "2010-06-01", "term" => "12", "cut" => "assim" };
    let (name, attrs) = pick(&registry, "resource", &old, &ctx).unwrap();
    assert_eq!(name, "GridPointFA");
    assert_eq!(attrs["term"], Value::Int(12));
    assert_eq!(attrs["nativefmt"], Value::from("fa"));
}

#[test]
fn gridpoint_rejections_are_explained() {
    let registry = catalog();
    let d = desc! { "kind" => "gridpoint", "date" => "2024010100", "term" => 6, "cutoff" => "production" };
    let report = registry.collector("resource").unwrap().explain(&d, &Context::default(), &Options::default());

    assert_eq!(report.selected().map(|c| c.candidate.as_str()), Some("GridPointGrib"));
    let whynot = report.whynot("GridPointFA");
    assert_eq!(whynot.len(), 1);
    assert_eq!(whynot[0].1[0].why, Why::OnlyMismatch);

    let outcast = desc! { "kind" => "gridpoint", "date" => "2024010100", "term" => -1, "cutoff" => "production" };
    let report = registry.collector("resource").unwrap().explain(&outcast, &Context::default(), &Options::default());
    assert!(report.selected().is_none());
    assert!(report.whynot("GridPoint").iter().all(|(_, diags)| diags.iter().any(|d| d.why == Why::IsOutcast)));
}

#[test]
fn climatology_month_defaults_from_the_date() {
    let registry = catalog();
    let ctx = Context::default();

    let d = desc! { "kind" => "clim_model", "date" => "2024031500" };
    let (name, attrs) = pick(&registry, "resource", &d, &ctx).unwrap();
    assert_eq!(name, "Climatology");
    assert_eq!(attrs["month"], Value::Int(3));

    let bad = desc! { "kind" => "clim_model", "date" => "2024031500", "month" => "13" };
    assert!(pick(&registry, "resource", &bad, &ctx).is_none());
}

#[test]
fn providers_are_told_apart_by_mandatory_attributes() {
    let registry = catalog();
    let ctx = Context::default();

    let (name, attrs) = pick(&registry, "provider", &desc! { "xp" => "abcd", "block" => "forecast" }, &ctx).unwrap();
    assert_eq!(name, "Experiment");
    assert_eq!(attrs["namespace"], Value::from("vortex.cache.fr"));

    let (name, attrs) = pick(&registry, "provider", &desc! { "suite" => "dbl", "vconf" => "3dvarfr" }, &ctx).unwrap();
    assert_eq!(name, "OpSuite");
    assert_eq!(attrs["suite"], Value::from("dble"));
    assert_eq!(attrs["igakey"], Value::from("arpege/3dvarfr"));

    let (name, attrs) = pick(&registry, "provider", &desc! { "remote" => "/tmp/file" }, &ctx).unwrap();
    assert_eq!(name, "Remote");
    assert_eq!(attrs["username"], Value::from("tester"));

    let report = registry.collector("provider").unwrap().explain(
        &desc! { "experiment" => "oper", "block" => "forecast" },
        &ctx,
        &Options::default(),
    );
    let whynot = report.whynot("Experiment");
    assert_eq!(whynot[0].1[0].why, Why::IsOutcast);
}

#[test]
fn archive_storage_chains_placeholders() {
    let registry = catalog();
    let d = desc! { "scheme" => "ftp", "netloc" => "hendrix" };
    let (name, attrs) = pick(&registry, "store", &d, &Context::default()).unwrap();
    assert_eq!(name, "Archive");
    assert_eq!(attrs["netloc"], Value::from("hendrix.meteo.fr"));
    assert_eq!(attrs["storage"], Value::from("tester@hendrix.meteo.fr"));
    assert_eq!(attrs["storetrack"], Value::Bool(true));
}

#[test]
fn mtool_cache_needs_an_ambient_glove() {
    let registry = catalog();
    let d = desc! { "scheme" => "vortex", "netloc" => "vortex.cache.fr" };

    let (name, attrs) = pick(&registry, "store", &d, &Context::default()).unwrap();
    assert_eq!(name, "Cache");
    assert_eq!(attrs["rootdir"], Value::from("/home/tester/cache"));

    let mut ctx = Context::default();
    ctx.defaults.push("cli", desc! { "glove" => "mtool" });
    let (name, attrs) = pick(&registry, "store", &d, &ctx).unwrap();
    assert_eq!(name, "MtoolCache");
    assert_eq!(attrs["rootdir"], Value::from("/scratch/mtool/tester/cache"));
}

#[test]
fn pickup_builds_a_full_chain() {
    let mut registry = catalog();
    let ctx = Context::default();
    let opts = Options::default();
    let mut d = desc! {
        "kind" => "analysis",
        "date" => "2024010100",
        "cutoff" => "assim",
        "experiment" => "abcd",
        "block" => "minim",
        "scheme" => "vortex",
        "netloc" => "vortex.cache.fr",
    };

    for tag in TAGS {
        let found = registry.collector_mut(tag).unwrap().pickup(&mut d, &ctx, &opts).unwrap();
        assert!(found.is_some(), "nothing picked for {tag}");
    }
    assert_eq!(d.keys().collect::<Vec<_>>(), TAGS);

    let resource = registry.collector("resource").unwrap().live();
    assert_eq!(resource.len(), 1);
    assert_eq!(resource[0].get("kind"), Some(Value::from("analysis")));
    match &d["provider"] {
        Value::Object(obj) => assert_eq!(obj.name(), "Experiment"),
        other => panic!("unexpected provider {other:?}"),
    }
}

#[test]
fn default_reuses_reusable_instances_only() {
    let mut registry = catalog();
    let ctx = Context::default();
    let opts = Options::default();
    let store = registry.collector_mut("store").unwrap();

    let cache = desc! { "scheme" => "vortex", "netloc" => "vortex.cache.fr" };
    let first = store.default(&cache, &ctx, &opts).unwrap().unwrap();
    let again = store.default(&cache, &ctx, &opts).unwrap().unwrap();
    assert!(Arc::ptr_eq(&first, &again));

    let local = desc! { "scheme" => "file" };
    let first = store.default(&local, &ctx, &opts).unwrap().unwrap();
    let again = store.default(&local, &ctx, &opts).unwrap().unwrap();
    assert_eq!(first.candidate().name(), "Finder");
    assert!(!Arc::ptr_eq(&first, &again));
}

#[test]
fn cache_instances_guard_their_attributes() {
    let registry = catalog();
    let d = desc! { "scheme" => "vortex", "netloc" => "vortex.cache.fr" };
    let selection = registry.collector("store").unwrap().pick_best(&d, &Context::default(), &Options::default());
    let instance = selection.unwrap().unwrap().instantiate().unwrap();

    instance.set("headdir", "mirror").unwrap();
    assert_eq!(instance.get("headdir"), Some(Value::from("mirror")));
    assert!(matches!(instance.set("rootdir", "/tmp"), Err(FootprintError::AccessDenied { .. })));
}

#[test]
fn attribute_map_lists_every_store_attribute() {
    let registry = catalog();
    let store = registry.collector("store").unwrap();
    let map = store.attribute_map();

    assert_eq!(
        map.keys().map(String::as_str).collect::<Vec<_>>(),
        vec!["headdir", "netloc", "rootdir", "scheme", "storage", "storetrack", "username"]
    );
    let schemes: Vec<&str> = map["scheme"].iter().map(|e| e.candidate.as_str()).collect();
    assert_eq!(schemes, vec!["Archive", "Cache", "Finder", "MtoolCache"]);
    assert_eq!(map["scheme"][0].values, vec![Value::from("ftp"), Value::from("ftserv")]);
    assert!(map["storage"][0].optional);

    let suites = registry.collector("provider").unwrap().values("suite");
    assert_eq!(suites, vec![Value::from("oper"), Value::from("dble"), Value::from("mirr")]);
}
