macro_rules! register_metric_groups {
    (
        $(
            $name:ident => $group:path
        ),* $(,)?
    ) => {
        /// Every catalog group, in launch order.
        #[must_use]
        pub fn all_groups() -> Vec<&'static MetricGroup> {
            vec![
                $(
                    &$group,
                )*
            ]
        }

        /// Look a catalog group up by name.
        #[must_use]
        pub fn find_group(name: &str) -> Option<&'static MetricGroup> {
            match name {
                $(
                    stringify!($name) => Some(&$group),
                )*
                _ => None,
            }
        }

        // Generate array of group names
        pub const GROUP_NAMES: &[&'static str] = &[
            $(stringify!($name),)*
        ];
    };
}
