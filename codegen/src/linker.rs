use otaboot::{
    hardware::{Config, Region},
    Address,
};

/// RAM used for data and stack by the program being linked
#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub struct LinkerConfig {
    pub ram: Region,
}

#[derive(Debug, PartialEq, Eq, Copy, Clone)]
pub enum LinkerError {
    /// Loading an image would overwrite the stack and data of the running bootloader
    RamOverlapsExecution(Region),
    /// The bootloader's RAM shares memory with its own code
    RamOverlapsBootloader(Region),
}

fn generate_linker_script(code: Region, ram: Region) -> String {
    format!(
        "
    MEMORY {{
        FLASH : ORIGIN = 0x{code_origin:08x}, LENGTH = {code_length}
        RAM : ORIGIN = 0x{ram_origin:08x}, LENGTH = {ram_length}
    }}
",
        code_origin = code.location,
        code_length = code.size,
        ram_origin = ram.location,
        ram_length = ram.size,
    )
}

fn symbol(name: &str, address: Address) -> String {
    format!("    {name} = 0x{address:08x};\n")
}

/// Links the bootloader at its resident address. The startup code has to run position
/// independent until relocation, so the address the ROM loads it to is exported as well.
///
/// The bootloader keeps running while images are copied into the execution region, so its RAM
/// has to lie outside of it.
pub fn generate_bootloader_script(
    config: Config,
    linker_config: LinkerConfig,
) -> Result<String, LinkerError> {
    let ram = linker_config.ram;
    if ram.overlaps(&config.execution) {
        return Err(LinkerError::RamOverlapsExecution(ram));
    }
    if ram.overlaps(&config.bootloader) {
        return Err(LinkerError::RamOverlapsBootloader(ram));
    }

    let mut script = generate_linker_script(config.bootloader, ram);
    script.push_str(&symbol(
        "_otaboot_load_origin",
        config.bootloader_load.location,
    ));
    script.push_str(&symbol(
        "_otaboot_resident_origin",
        config.bootloader.location,
    ));
    Ok(script)
}

/// Links a factory or custom image at the start of the execution region.
pub fn generate_application_script(config: Config, linker_config: LinkerConfig) -> String {
    generate_linker_script(config.execution, linker_config.ram)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Tightly coupled data RAM, separate from the SRAM images are loaded into
    fn linker_config() -> LinkerConfig {
        LinkerConfig {
            ram: Region::new(0x1000_0000, 0x8000),
        }
    }

    #[test]
    fn bootloader_is_linked_at_its_resident_address() {
        let script = generate_bootloader_script(Config::default(), linker_config()).unwrap();

        assert!(script.contains("FLASH : ORIGIN = 0x20000000, LENGTH = 16384"));
        assert!(script.contains("RAM : ORIGIN = 0x10000000, LENGTH = 32768"));
        assert!(script.contains("_otaboot_load_origin = 0x20004000;"));
        assert!(script.contains("_otaboot_resident_origin = 0x20000000;"));
        assert!(!script.contains("_otaboot_load_length"));
    }

    #[test]
    fn bootloader_ram_must_survive_image_loading() {
        let config = Config::default();

        // Top of SRAM, where images larger than 176 KiB end up
        let inside = Region::new(0x2003_0000, 0x1_0000);
        assert_eq!(
            generate_bootloader_script(config, LinkerConfig { ram: inside }),
            Err(LinkerError::RamOverlapsExecution(inside))
        );

        let resident = Region::new(0x2000_3000, 0x1000);
        assert_eq!(
            generate_bootloader_script(config, LinkerConfig { ram: resident }),
            Err(LinkerError::RamOverlapsBootloader(resident))
        );
    }

    #[test]
    fn application_is_linked_at_the_execution_region() {
        let script = generate_application_script(Config::default(), linker_config());

        assert!(script.contains("FLASH : ORIGIN = 0x20004000, LENGTH = 245760"));
        assert!(!script.contains("_otaboot"));
    }
}
