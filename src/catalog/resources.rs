use std::sync::Arc;

use chrono::{NaiveDate, NaiveDateTime};

use crate::{AttrType, Candidate, CandidateDecl, FootprintError, Result};

const TAG: &str = "resource";

/// Gridpoint files switched from FA to GRIB on this date.
fn grib_switch() -> Result<NaiveDateTime> {
    NaiveDate::from_ymd_opt(2016, 1, 1)
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .ok_or_else(|| FootprintError::InvalidRange("2016-01-01".to_string()))
}

pub(super) fn candidates() -> Result<Vec<Arc<Candidate>>> {
    let resource = CandidateDecl::new("Resource")
        .collector(TAG)
        .abstract_candidate(true)
        .footprint(footprint! {
            info: "Abstract model resource",
            attr: {
                kind {},
                date { ty: AttrType::Date },
                model { optional: true, default: "arpege", values: ["arpege", "arome", "ifs"] },
                geometry { optional: true, default: "global" },
            },
        })
        .build()?;

    let analysis = CandidateDecl::new("Analysis")
        .extends(&resource)
        .footprint(footprint! {
            info: "Atmospheric or surface analysis",
            attr: {
                kind {
                    values: ["analysis", "analyse", "atm_analysis"],
                    remap: [("analyse", "analysis"), ("atm_analysis", "analysis")],
                },
                cutoff {
                    info: "Cutoff type of the assimilation cycle",
                    alias: ["cut"],
                    values: ["assim", "production"],
                    remap: [("a", "assim"), ("p", "production")],
                },
                filling { optional: true, default: "full", values: ["full", "surf", "atm"] },
                nativefmt { optional: true, default: "fa" },
            },
        })
        .build()?;

    let gridpoint = CandidateDecl::new("GridPoint")
        .extends(&resource)
        .abstract_candidate(true)
        .footprint(footprint! {
            info: "Post-processed model output",
            attr: {
                kind { values: ["gridpoint"] },
                term { ty: AttrType::Int, outcast: [-1] },
                cutoff { alias: ["cut"], values: ["assim", "production"] },
                basename { optional: true, default: "grid.[model].[geometry]+[term%04d]" },
            },
        })
        .build()?;

    let grib = CandidateDecl::new("GridPointGrib")
        .extends(&gridpoint)
        .abstract_candidate(false)
        .footprint(
            footprint! {
                attr: {
                    nativefmt { optional: true, default: "grib", values: ["grib"] },
                },
            }
            .only("after_date", [grib_switch()?]),
        )
        .build()?;

    let fa = CandidateDecl::new("GridPointFA")
        .extends(&gridpoint)
        .abstract_candidate(false)
        .footprint(
            footprint! {
                attr: {
                    nativefmt { optional: true, default: "fa", values: ["fa"] },
                },
            }
            .only("before_date", [grib_switch()?]),
        )
        .build()?;

    let clim = CandidateDecl::new("Climatology")
        .collector(TAG)
        .realkind("clim_model")
        .footprint(footprint! {
            info: "Monthly model climatology",
            attr: {
                kind { values: ["clim_model"] },
                date { ty: AttrType::Date },
                month { ty: AttrType::Int, optional: true, default: "[date:month]", values: 1..=12 },
                model { optional: true, default: "arpege" },
                geometry { optional: true, default: "global" },
            },
        })
        .build()?;

    Ok(vec![resource, analysis, gridpoint, grib, fa, clim])
}
