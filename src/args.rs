use clap::{crate_authors, crate_description, crate_version, App, AppSettings, Arg, ArgMatches, SubCommand};


fn is_number(s: String) -> Result<(), String> {
    s.parse::<usize>()
        .map(|_| ())
        .map_err(|e| format!("{}", e))
}

pub fn parse<'a>() -> ArgMatches<'a> {
    App::new("tilechange")
        .version(crate_version!())
        .author(crate_authors!())
        .about(crate_description!())
        .setting(AppSettings::SubcommandRequiredElseHelp)
        .arg(Arg::with_name("config")
            .short("c")
            .long("config")
            .value_name("FILE")
            .help("Set a custom config file")
            .takes_value(true))
        .arg(Arg::with_name("overwrite")
            .long("overwrite")
            .help("Process tiles again even if their output already exists"))
        .arg(Arg::with_name("threads")
            .short("j")
            .long("threads")
            .value_name("N")
            .validator(is_number)
            .help("Number of worker threads (default is the number of CPUs)")
            .takes_value(true))
        .arg(Arg::with_name("method")
            .short("m")
            .long("method")
            .value_name("METHOD")
            .possible_values(&["class_mask", "difference"])
            .help("Change detection method")
            .takes_value(true))
        .subcommand(SubCommand::with_name("tiles")
            .about("Print the tiles covered by the sample grid"))
        .subcommand(SubCommand::with_name("download")
            .about("Download the tiles of both layers"))
        .subcommand(SubCommand::with_name("detect")
            .about("Detect class changes between both layers"))
        .subcommand(SubCommand::with_name("filter")
            .about("Remove small change regions from the detected masks")
            .arg(Arg::with_name("min-size")
                .long("min-size")
                .value_name("N")
                .validator(is_number)
                .help("Smallest change region in pixels that is kept")
                .takes_value(true)))
        .subcommand(SubCommand::with_name("classify")
            .about("Sort the filtered masks into change and no_change")
            .arg(Arg::with_name("tolerance")
                .long("tolerance")
                .value_name("N")
                .validator(is_number)
                .help("Number of changed pixels that still count as no change")
                .takes_value(true)))
        .subcommand(SubCommand::with_name("run")
            .about("Download, detect, filter and classify"))
        .get_matches()
}
