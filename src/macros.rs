#[macro_export]
macro_rules! regex {
    ($pat:literal) => {{
        static RE: once_cell::sync::Lazy<regex::Regex> =
            once_cell::sync::Lazy::new(|| regex::Regex::new($pat).unwrap());
        &*RE
    }};
}

/// Declare one attribute: `attr!(name, key: value, ...)`.
///
/// Every `key` is an [`AttrSpec`](crate::AttrSpec) setter (`info`, `optional`,
/// `default`, `alias`, `remap`, `remap_first`, `values`, `outcast`, `ty`,
/// `args`, `access`).
#[macro_export]
macro_rules! attr {
    ($name:ident $(, $key:ident : $value:expr)* $(,)?) => {
        $crate::AttrSpec::new(stringify!($name)) $(.$key($value))*
    };
}

/// Declare a footprint.
///
/// ```
/// use footprints::{footprint, AttrType};
///
/// let fp = footprint! {
///     info: "Climatology files",
///     priority: "toolbox",
///     attr: {
///         kind { values: ["clim"] },
///         month { ty: AttrType::Int, values: 1..=12 },
///         geometry { optional: true, default: "global" },
///     },
///     only: { cluster: ["belenos"] },
/// };
/// assert_eq!(fp.mandatory(), vec!["kind", "month"]);
/// ```
#[macro_export]
macro_rules! footprint {
    ($($section:ident : $body:tt),* $(,)?) => {{
        let fp = $crate::Footprint::new();
        $(let fp = $crate::footprint!(@section fp, $section, $body);)*
        fp
    }};
    (@section $fp:ident, info, $info:expr) => {
        $fp.info($info)
    };
    (@section $fp:ident, priority, $level:expr) => {
        $fp.priority($level)
    };
    (@section $fp:ident, attr, { $($name:ident { $($key:ident : $value:expr),* $(,)? }),* $(,)? }) => {
        $fp $(.attr($crate::attr!($name $(, $key: $value)*)))*
    };
    (@section $fp:ident, only, { $($key:ident : $value:expr),* $(,)? }) => {
        $fp $(.only(stringify!($key), $value))*
    };
    (@section $fp:ident, bind, [ $([ $($member:expr),* $(,)? ]),* $(,)? ]) => {
        $fp $(.bind([$($member),*]))*
    };
}
