//! Serde formats for calendar values exchanged over HTTP.
//!
//! Dates travel as `YYYY-MM-DD`, departure times as `HH:MM`.

pub mod date {
    use serde::{de, ser, Deserialize as _, Deserializer, Serializer};
    use time::{macros::format_description, Date};

    pub fn serialize<S: Serializer>(
        date: &Date,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let text = date
            .format(format_description!("[year]-[month]-[day]"))
            .map_err(ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Date, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(de::Error::custom)
    }

    pub fn parse(text: &str) -> Result<Date, time::error::Parse> {
        Date::parse(text, format_description!("[year]-[month]-[day]"))
    }

    pub mod option {
        use serde::{Deserialize as _, Deserializer, Serializer};
        use time::Date;

        pub fn serialize<S: Serializer>(
            date: &Option<Date>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match date {
                Some(date) => super::serialize(date, serializer),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Date>, D::Error> {
            Option::<String>::deserialize(deserializer)?
                .filter(|text| !text.is_empty())
                .map(|text| super::parse(&text))
                .transpose()
                .map_err(serde::de::Error::custom)
        }
    }
}

pub mod clock {
    use serde::{de, ser, Deserialize as _, Deserializer, Serializer};
    use time::{macros::format_description, Time};

    pub fn serialize<S: Serializer>(
        time: &Time,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        let text = if time.second() == 0 {
            time.format(format_description!("[hour]:[minute]"))
        } else {
            time.format(format_description!("[hour]:[minute]:[second]"))
        }
        .map_err(ser::Error::custom)?;
        serializer.serialize_str(&text)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Time, D::Error> {
        let text = String::deserialize(deserializer)?;
        parse(&text).map_err(de::Error::custom)
    }

    /// Accepts both `HH:MM` and `HH:MM:SS`.
    pub fn parse(text: &str) -> Result<Time, time::error::Parse> {
        Time::parse(text, format_description!("[hour]:[minute]")).or_else(
            |_| {
                Time::parse(text, format_description!("[hour]:[minute]:[second]"))
            },
        )
    }
}
